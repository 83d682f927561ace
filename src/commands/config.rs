use colored::Colorize;
use serde_json::Value;

use crate::cli::{Cli, ConfigCommands};
use crate::config::Config;
use crate::error::{Result, WatchError};

pub async fn run(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli).await,
        ConfigCommands::Get { key } => get(cli, key).await,
        ConfigCommands::Path => path(cli).await,
        ConfigCommands::Init { force } => init(cli, *force).await,
    }
}

async fn show(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| WatchError::ConfigError(e.to_string()))?;
        println!("{}", toml_str);
    }

    Ok(())
}

/// Look up a dotted key (`watch.target_url`) in the serialized configuration
fn lookup(config: &Config, key: &str) -> Result<Value> {
    let root = serde_json::to_value(config)?;
    key.split('.')
        .try_fold(&root, |node, part| node.get(part))
        .cloned()
        .ok_or_else(|| WatchError::ConfigError(format!("Unknown config key: {}", key)))
}

async fn get(cli: &Cli, key: &str) -> Result<()> {
    let config = cli.load_config()?;
    let value = lookup(&config, key)?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "key": key,
                "value": value
            })
        );
    } else {
        match value {
            Value::Null => println!("{}", "(not set)".dimmed()),
            Value::String(s) => println!("{}", s),
            other => println!("{}", other),
        }
    }

    Ok(())
}

async fn path(cli: &Cli) -> Result<()> {
    let path = cli.config_path();

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string(),
                "exists": path.exists()
            })
        );
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

async fn init(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config_path();

    if path.exists() && !force {
        return Err(WatchError::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save_to(&path)?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "status": "created", "path": path.display().to_string() })
        );
    } else {
        println!(
            "{} Config written: {}",
            "✓".green(),
            path.display().to_string().dimmed()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_follows_dotted_keys() {
        let config = Config::default();

        assert_eq!(
            lookup(&config, "watch.poll_interval_ms").unwrap(),
            Value::from(2000)
        );
        assert_eq!(lookup(&config, "browser.proxy").unwrap(), Value::Null);
        assert_eq!(
            lookup(&config, "selectors.card").unwrap(),
            Value::from(".order-card")
        );
    }

    #[test]
    fn lookup_rejects_unknown_keys() {
        let err = lookup(&Config::default(), "watch.nope").unwrap_err();
        assert!(matches!(err, WatchError::ConfigError(msg) if msg.contains("watch.nope")));
    }
}
