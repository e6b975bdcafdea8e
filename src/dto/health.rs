use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (always "ok" while the process serves requests).
    pub status: String,
    /// Number of live sessions.
    pub sessions: usize,
    /// Number of open WebSocket connections.
    pub connections: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(sessions: usize, connections: usize) -> Self {
        Self {
            status: "ok".to_string(),
            sessions,
            connections,
        }
    }
}
