use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether storage is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_ok = match state.require_game_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    if storage_ok {
        HealthResponse::ok(state.sessions().len())
    } else {
        HealthResponse::degraded(state.sessions().len())
    }
}
