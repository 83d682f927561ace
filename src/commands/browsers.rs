use colored::Colorize;

use crate::browser::discover_all_browsers;
use crate::cli::Cli;
use crate::error::Result;

pub async fn run(cli: &Cli) -> Result<()> {
    let browsers = discover_all_browsers();

    if cli.json {
        let list: Vec<_> = browsers
            .iter()
            .map(|b| {
                serde_json::json!({
                    "type": b.browser_type.name(),
                    "path": b.path.display().to_string(),
                    "version": b.version,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("{}", "Detected Browsers:".bold());
    if browsers.is_empty() {
        println!("  {} No browsers found", "!".yellow());
        return Ok(());
    }

    for browser in browsers {
        println!(
            "  {} {} {}",
            "✓".green(),
            browser.browser_type.name(),
            browser
                .version
                .map(|v| format!("(v{})", v))
                .unwrap_or_default()
                .dimmed()
        );
        println!("    {}", browser.path.display().to_string().dimmed());
    }

    Ok(())
}
