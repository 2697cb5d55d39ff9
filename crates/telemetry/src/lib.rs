//! Tracing bootstrap.

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cover_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global subscriber: pretty or JSON lines on stderr, filtered
/// by `RUST_LOG` when set, by `settings.log_level` otherwise.
///
/// A subscriber installed earlier (tests, embedding binaries) is kept.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(
            target: "cover-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}

fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid RUST_LOG directives '{directives}'")),
        _ => EnvFilter::try_new(&settings.log_level)
            .with_context(|| format!("invalid telemetry.log_level '{}'", settings.log_level)),
    }
}
