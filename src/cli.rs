use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;
use crate::config::Config;
use crate::error::Result;

/// Orderwatch - watch a partner order page and log every new order
#[derive(Parser)]
#[command(name = "orderwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: <config dir>/orderwatch/config.toml)
    #[arg(short, long, env = "ORDERWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Order list URL to watch (overrides watch.target_url)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Browser executable path (overrides auto-discovery)
    #[arg(long, env = "ORDERWATCH_BROWSER_PATH", global = true)]
    pub browser_path: Option<String>,

    /// Run in headless mode
    #[arg(long, global = true)]
    pub headless: bool,

    /// Directory for snapshots, the order log and the run log
    #[arg(short, long, global = true)]
    pub output_dir: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `watch`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the order page until interrupted (default)
    Watch {
        /// Also save a full-page screenshot with every periodic snapshot
        #[arg(long)]
        screenshots: bool,
    },

    /// Open the order page once and save an HTML snapshot
    Snapshot {
        /// Also save a full-page PNG screenshot
        #[arg(long)]
        screenshot: bool,
    },

    /// Parse a saved detail panel or page snapshot offline
    Parse {
        /// HTML file to parse
        file: PathBuf,
    },

    /// List detected browsers
    Browsers,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Get a configuration value (e.g. watch.target_url)
    Get {
        /// Dotted configuration key
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Write a configuration file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Configuration file this invocation reads
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::config_path)
    }

    /// Load the layered configuration and apply command-line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_from(Some(&self.config_path()))?;

        if let Some(url) = &self.url {
            config.watch.target_url = url.clone();
        }
        if let Some(path) = &self.browser_path {
            config.browser.executable = Some(path.clone());
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = Some(dir.clone());
        }

        Ok(config)
    }

    /// Whether this invocation drives a browser and keeps a run log file
    pub fn writes_run_log(&self) -> bool {
        matches!(
            self.command,
            None | Some(Commands::Watch { .. }) | Some(Commands::Snapshot { .. })
        )
    }

    pub async fn run(&self) -> Result<()> {
        match &self.command {
            None => commands::watch::run(self, false).await,
            Some(Commands::Watch { screenshots }) => commands::watch::run(self, *screenshots).await,
            Some(Commands::Snapshot { screenshot }) => commands::snapshot::run(self, *screenshot).await,
            Some(Commands::Parse { file }) => commands::parse::run(self, file).await,
            Some(Commands::Browsers) => commands::browsers::run(self).await,
            Some(Commands::Config { command }) => commands::config::run(self, command).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["orderwatch", "--headless"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.headless);
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "orderwatch",
            "snapshot",
            "--screenshot",
            "--url",
            "https://partner.example/meal/9/order/list",
        ])
        .unwrap();

        assert!(matches!(cli.command, Some(Commands::Snapshot { screenshot: true })));
        assert_eq!(cli.url.as_deref(), Some("https://partner.example/meal/9/order/list"));
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[browser]\nheadless = false\ncdp_port = 9333\n").unwrap();

        let cli = Cli::try_parse_from([
            "orderwatch",
            "--config",
            path.to_str().unwrap(),
            "--headless",
            "--output-dir",
            "/tmp/orders",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert!(config.browser.headless);
        assert_eq!(config.browser.cdp_port, 9333);
        assert_eq!(config.output.dir.as_deref(), Some("/tmp/orders"));
    }
}
