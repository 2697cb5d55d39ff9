use std::sync::Arc;

use anyhow::Context;
use cover_app::{build_registry, Gateway};
use cover_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load cover settings")?;
    cover_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        core = %settings.upstreams.core.base_url(),
        index = %settings.upstreams.index.base_url(),
        "cover-app bootstrap starting"
    );

    let gateway = Arc::new(Gateway::from_settings(&settings)?);
    let registry = build_registry(gateway);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!(modules = registry.module_count(), "cover-app bootstrap complete");

    let served = cover_http::start_server(&registry, &settings, shutdown_signal()).await;

    registry.stop_modules().await?;
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
