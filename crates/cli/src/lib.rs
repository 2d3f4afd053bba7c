pub mod clipboard;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use collateral_core::config::{AppConfig, LogFormat};
use collateral_core::ResourceKind;

use crate::commands::GlobalOptions;

#[derive(Debug, Parser)]
#[command(
    name = "collateral",
    about = "Generate shareable company profile and quotation links",
    long_about = "Create marketing collateral records on the backend and print the shareable link.",
    after_help = "Examples:\n  collateral profile --company \"Acme Travel\"\n  collateral quote --company Acme --trip \"City Tour=100\" --trip \"Museum=50=Guided visit\"\n  collateral resume --kind quotation --id 42 --company Acme"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to collateral.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Backend base url, overriding config and environment")]
    base_url: Option<String>,
    #[arg(long, global = true, help = "Copy the generated link to the terminal clipboard")]
    copy: bool,
    #[arg(long, global = true, help = "Include the audit trail in the JSON output")]
    audit: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Create a company profile record and print its link")]
    Profile {
        #[arg(long)]
        company: String,
    },
    #[command(about = "Create a quotation from the given trips and print its link")]
    Quote {
        #[arg(long)]
        company: String,
        #[arg(long = "trip", value_name = "NAME=PRICE[=DESCRIPTION]")]
        trips: Vec<String>,
    },
    #[command(about = "Attach the link to a record that was created without one")]
    Resume {
        #[arg(long)]
        kind: ResourceKind,
        #[arg(long)]
        id: String,
        #[arg(long)]
        company: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config_path: cli.config,
        base_url: cli.base_url,
        copy: cli.copy,
        audit: cli.audit,
    };

    // A broken config is reported by the command itself.
    if let Ok(config) = AppConfig::load(options.load_options()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Profile { company } => commands::generate::profile(&options, &company),
        Command::Quote { company, trips } => commands::generate::quote(&options, &company, &trips),
        Command::Resume { kind, id, company } => {
            commands::resume::run(&options, kind, &id, &company)
        }
        Command::Config => commands::config::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON line.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
