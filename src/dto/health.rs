use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Client sessions currently held in memory.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(active_sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_sessions,
        }
    }

    /// Storage unreachable; writes and reads answer 503.
    pub fn degraded(active_sessions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_sessions,
        }
    }
}
