//! Quarantine CLI: runs the containment responder against a single finding event.
//!
//! The invocation response is the only thing written to stdout; logs go to stderr.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Automated containment for compute-instance security findings
#[derive(Parser, Debug)]
#[command(name = "quarantine", version, about, long_about = None)]
struct Cli {
    /// Policy file (TOML); environment variables take precedence
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Respond to one finding event
    Respond {
        /// Event file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: PathBuf,

        /// JSON inventory mapping instance ids to attached volume ids
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Deliver notifications to this HTTP endpoint instead of the log
        #[arg(long)]
        webhook_url: Option<String>,
    },
    /// Print the effective response policy
    Policy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    let layer = match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };
    tracing_subscriber::registry().with(layer).init();

    commands::handle_command(cli.command, cli.config.as_deref()).await
}
