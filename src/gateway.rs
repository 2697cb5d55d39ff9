//! Shared state handed to every endpoint module.

use anyhow::Context;

use cover_kernel::settings::{DetailPolicy, Settings};
use cover_upstream::{Backend, SessionCredential, UpstreamClient};

use crate::services::{health, models::HealthStatus, Aggregator, SagaOrchestrator};

/// One client per backend plus the aggregation policy. Holds no
/// request state; every request brings its own session credential.
#[derive(Debug, Clone)]
pub struct Gateway {
    core: UpstreamClient,
    index: UpstreamClient,
    detail_policy: DetailPolicy,
}

impl Gateway {
    pub fn new(core: UpstreamClient, index: UpstreamClient, detail_policy: DetailPolicy) -> Self {
        Self {
            core,
            index,
            detail_policy,
        }
    }

    /// Build both clients from the configured upstream locations.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let core = UpstreamClient::new(Backend::Core, &settings.upstreams.core)
            .context("failed to create Core client")?;
        let index = UpstreamClient::new(Backend::Index, &settings.upstreams.index)
            .context("failed to create Index client")?;

        tracing::info!(
            core = core.base_url(),
            index = index.base_url(),
            detail_policy = ?settings.aggregation.detail_policy,
            "upstream clients ready"
        );

        Ok(Self::new(core, index, settings.aggregation.detail_policy))
    }

    pub fn core(&self) -> &UpstreamClient {
        &self.core
    }

    pub fn index(&self) -> &UpstreamClient {
        &self.index
    }

    pub fn detail_policy(&self) -> DetailPolicy {
        self.detail_policy
    }

    pub fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::new(&self.core, &self.index, self.detail_policy)
    }

    pub fn saga(&self) -> SagaOrchestrator<'_> {
        SagaOrchestrator::new(&self.core)
    }

    /// Core first, then Index.
    pub async fn health(&self, session: &SessionCredential) -> Vec<HealthStatus> {
        health::check_all(&[&self.core, &self.index], session).await
    }
}
