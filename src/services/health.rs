//! Concurrent reachability probes of the backends.

use futures_util::future::join_all;
use serde_json::Value;

use cover_upstream::{SessionCredential, UpstreamClient};

use super::models::HealthStatus;

/// Path every backend answers for liveness.
pub const PROBE_PATH: &str = "/test";

/// Probe every backend at once and report one status per backend, in the
/// order given.
///
/// Any 2xx answer counts as reachable, whatever its body. A failed probe is
/// recorded as unreachable and never affects the other probes; this
/// function itself cannot fail.
pub async fn check_all(
    backends: &[&UpstreamClient],
    session: &SessionCredential,
) -> Vec<HealthStatus> {
    join_all(backends.iter().map(|client| probe(client, session))).await
}

async fn probe(client: &UpstreamClient, session: &SessionCredential) -> HealthStatus {
    match client.get_lenient(PROBE_PATH, session).await {
        Ok(detail) => HealthStatus {
            service_name: client.backend(),
            reachable: true,
            detail,
        },
        Err(err) => {
            tracing::warn!(service = %client.backend(), error = %err, "health probe failed");
            HealthStatus {
                service_name: client.backend(),
                reachable: false,
                detail: Value::String(err.to_string()),
            }
        }
    }
}
