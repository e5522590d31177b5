use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pomobot_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "pomobot", version, about = "Group Pomodoro timers for chat channels")]
struct Cli {
    /// Config file (defaults to ~/.config/pomobot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host the timers and read chat commands from stdin
    Run(commands::run::RunArgs),
    /// Validate a setup string and print its stages as JSON
    Parse {
        /// Setup string, e.g. "Study, 25, Good luck!; Break, 5"
        setup: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    })
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => load_config(cli.config.as_ref()).and_then(|config| {
            init_logging(&config);
            commands::run::run(args, config)
        }),
        Commands::Parse { setup } => commands::parse::run(&setup),
        Commands::Config { action } => commands::config::run(action, cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
