use std::path::Path;

use chrono::Local;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orderwatch::cli::Cli;
use orderwatch::Result;

/// Console logging on stderr, plus a per-run log file when `log_dir` is given.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // chromiumoxide logs every CDP event it cannot deserialize; those are harmless
    let level = if verbose { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{},chromiumoxide::conn=warn,chromiumoxide::handler=warn",
                level
            ))
        })
    };

    let file_writer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(format!("orderwatch-{}", Local::now().format("%Y%m%d_%H%M%S")))
            .filename_suffix("log")
            .build(dir)
            .ok()
    });

    let (file_layer, guard) = match file_writer {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter()))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = if cli.writes_run_log() {
        cli.load_config().ok().map(|c| c.output.output_dir())
    } else {
        None
    };
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());

    cli.run().await
}
