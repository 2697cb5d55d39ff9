use anyhow::Context;
use clap::{Parser, Subcommand};

use cover_app::Gateway;
use cover_kernel::settings::Settings;
use cover_upstream::SessionCredential;

/// Operator tool for the cover gateway
#[derive(Debug, Parser)]
#[command(name = "cover-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved configuration as JSON
    Config,
    /// Probe Core and Index once and print their statuses as JSON
    Probe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load cover settings")?;
    cover_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .context("failed to render settings")?;
            println!("{rendered}");
        }
        Command::Probe => {
            let gateway = Gateway::from_settings(&settings)?;
            // Not tied to any caller, so no credential is sent.
            let statuses = gateway.health(&SessionCredential::Anonymous).await;
            tracing::debug!(
                reachable = statuses.iter().filter(|s| s.reachable).count(),
                total = statuses.len(),
                "probe finished"
            );
            let rendered = serde_json::to_string_pretty(&statuses)
                .context("failed to render statuses")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
