pub mod commands;
pub mod source;

use std::io;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use storefront_core::config::{AppConfig, LoadOptions};

use crate::commands::segment::SegmentArgs;

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront customer segmentation CLI",
    long_about = "Score customers on recency, frequency, and monetary value and group them into marketing segments.",
    after_help = "Examples:\n  storefront segment transactions.json\n  storefront segment transactions.json --now 2024-06-01T00:00:00Z --summary\n  storefront rules\n  storefront config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Segment the customers found in a JSON transaction snapshot")]
    Segment(SegmentArgs),
    #[command(about = "List the ordered segment rules with their recommended actions")]
    Rules,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = AppConfig::load(logging_load_options(&cli)).unwrap_or_default();
    if let Err(error) = init_logging(&logging_config) {
        eprintln!("logging disabled: {error}");
    }

    let result = match cli.command {
        Command::Segment(args) => commands::segment::run(args),
        Command::Rules => {
            commands::CommandResult { exit_code: 0, output: commands::rules::run() }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logging honors the same config file the subcommand will load.
fn logging_load_options(cli: &Cli) -> LoadOptions {
    let config_path = match &cli.command {
        Command::Segment(args) => args.config.clone(),
        Command::Rules | Command::Config => None,
    };
    LoadOptions { config_path, ..LoadOptions::default() }
}

/// Diagnostics go to stderr so stdout stays a clean JSON payload.
fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use storefront_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(io::stderr);

    let installed = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("could not install tracing subscriber: {error}"))
}
