use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::browser::ChromeSessionFactory;
use crate::cli::Cli;
use crate::error::Result;
use crate::output::{OrderLog, SnapshotStore};
use crate::watch::{CssPageAdapter, PollLoop, PollStats};

pub async fn run(cli: &Cli, screenshots: bool) -> Result<()> {
    let config = cli.load_config()?;
    let adapter = CssPageAdapter::new(&config.selectors, &config.watch)?;
    let output_dir = config.output.output_dir();

    if !cli.json {
        println!("{} Watching {}", "→".cyan(), config.watch.target_url);
        println!("  {}", format!("Output: {}", output_dir.display()).dimmed());
        println!("  {}", "Press Ctrl+C to stop".dimmed());
    }

    let mut poll = PollLoop::new(
        config.watch.clone(),
        Arc::new(adapter),
        Box::new(ChromeSessionFactory::new(config.browser.clone())),
        SnapshotStore::new(&output_dir, &config.output.snapshot_prefix),
        OrderLog::new(config.output.orders_log_path()),
    )
    .with_screenshots(screenshots || config.output.screenshots);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current tick");
            on_signal.cancel();
        }
    });

    let stats = poll.run(cancel).await?;
    print_stats(cli, &stats)?;
    Ok(())
}

fn print_stats(cli: &Cli, stats: &PollStats) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("{} Stopped", "✓".green());
    let rows = [
        ("Ticks", stats.ticks),
        ("Cards clicked", stats.cards_clicked),
        ("Orders parsed", stats.orders_parsed),
        ("Detail pages", stats.detail_pages),
        ("Stale panels", stats.stale_panels),
        ("Card failures", stats.card_failures),
        ("Tick errors", stats.tick_errors),
        ("Recoveries", stats.recoveries),
        ("Snapshots", stats.snapshots),
    ];
    for (label, value) in rows {
        println!("  {:<14} {}", format!("{}:", label).dimmed(), value);
    }
    Ok(())
}
