use clap::Subcommand;
use pomobot_core::Config;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "scheduler.poll_interval_ms", "log.filter")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
    /// Print the config file location
    Path,
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::path()?,
    })
}

pub fn run(action: ConfigAction, explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(explicit)?;
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load_from(&path)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(&path)?;
            config.set(&key, &value)?;
            config.save_to(&path)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load_from(&path)?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            Config::default().save_to(&path)?;
            println!("config reset to defaults");
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
