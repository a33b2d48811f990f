mod commands;
mod config;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use commands::Command;

#[derive(Parser)]
#[command(name = "waybill")]
#[command(about = "Deploy contract graphs and keep a per-chain address ledger")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. info, waybill_core=debug)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    cli.command.run().await
}

/// Structured logs go to stderr so stdout stays clean for `waybill get`
fn init_logging(default_level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .with(env_filter)
        .init();
}
