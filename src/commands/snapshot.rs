use colored::Colorize;

use crate::browser::{BrowserSession, PageDriver};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::output::{capture_page_html, SnapshotStore};

pub async fn run(cli: &Cli, screenshot: bool) -> Result<()> {
    let config = cli.load_config()?;
    let mut session = BrowserSession::start(&config.browser).await?;

    let result = capture(cli, &config, &mut session, screenshot).await;
    session.close().await;
    result
}

async fn capture(cli: &Cli, config: &Config, session: &mut BrowserSession, screenshot: bool) -> Result<()> {
    session.navigate(&config.watch.target_url).await?;

    let store = SnapshotStore::new(config.output.output_dir(), &config.output.snapshot_prefix);
    let html = capture_page_html(&*session).await?;
    let html_path = store.save(&html)?;

    let png_path = if screenshot {
        let path = store.next_path(&config.output.snapshot_prefix, "png");
        session.screenshot(&path, true).await?;
        Some(path)
    } else {
        None
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "url": session.current_url().await?,
                "title": session.title().await?,
                "html": html_path.display().to_string(),
                "screenshot": png_path.map(|p| p.display().to_string()),
            })
        );
    } else {
        println!("{} Snapshot saved: {}", "✓".green(), html_path.display());
        if let Some(path) = png_path {
            println!("{} Screenshot saved: {}", "✓".green(), path.display());
        }
    }

    Ok(())
}
