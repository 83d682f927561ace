use std::path::Path;

use colored::Colorize;

use crate::cli::Cli;
use crate::error::{Result, WatchError};
use crate::output::{format_entry, OrderEntry};
use crate::watch::{parse_detail_markup, PanelSelectors};

pub async fn run(cli: &Cli, file: &Path) -> Result<()> {
    let config = cli.load_config()?;
    let selectors = PanelSelectors::compile(&config.selectors)?;

    let html = std::fs::read_to_string(file).map_err(|e| {
        WatchError::Other(format!("Failed to read {}: {}", file.display(), e))
    })?;
    let outcome = parse_detail_markup(&html, &selectors);

    if cli.json {
        let anomalies: Vec<String> = outcome.anomalies.iter().map(ToString::to_string).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": file.display().to_string(),
                "partial": outcome.is_partial(),
                "order": outcome.order,
                "anomalies": anomalies,
            }))?
        );
        return Ok(());
    }

    if outcome.order.is_empty() {
        println!("{} Nothing recognised in {}", "!".yellow(), file.display());
    }
    let entry = OrderEntry::new(file.display().to_string(), "file", outcome);
    print!("{}", format_entry(&entry));
    Ok(())
}
