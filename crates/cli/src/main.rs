mod commands;
mod config;

use std::process;

use batchloc_core::ErrorEnvelope;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::{health, locate, tables};
use crate::config::SourceArgs;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Current processing location of every manufacturing batch.
#[derive(Parser)]
#[command(
    name = "batchloc",
    version,
    about = "Current processing location of every manufacturing batch"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log level for batchloc crates (RUST_LOG overrides)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the current step of every batch
    Locate {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print every (batch, process module) pairing with its resolved names
    Steps {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Locate the snapshot tables without reading them
    Tables {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Report service status
    Health,
}

fn init_logging(level: &str, quiet: bool) {
    let level = if quiet { "error" } else { level };
    let fallback = format!(
        "batchloc={level},batchloc_core={level},batchloc_storage={level},warn",
        level = level
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.quiet);

    match cli.command {
        Commands::Locate { source } => {
            locate::cmd_locate(&source, cli.output, cli.quiet);
        }
        Commands::Steps { source } => {
            locate::cmd_steps(&source, cli.output, cli.quiet);
        }
        Commands::Tables { source } => {
            tables::cmd_tables(&source, cli.output, cli.quiet);
        }
        Commands::Health => {
            health::cmd_health(cli.output, cli.quiet);
        }
    }
}

/// Report a failure in the selected output format.
///
/// JSON failures are the command's result, so the envelope goes to stdout
/// even under `--quiet`. Text failures go to stderr unless quiet.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let envelope = ErrorEnvelope::new(msg);
            let json = serde_json::to_string_pretty(&envelope)
                .unwrap_or_else(|_| format!("{{\"success\": false, \"error\": {:?}}}", msg));
            println!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", msg);
            }
        }
    }
}

/// Print a JSON value, falling back to an error envelope if it cannot be serialized.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            report_error(&format!("serialization: {}", e), OutputFormat::Json, false);
            process::exit(1);
        }
    }
}
