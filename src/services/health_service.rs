use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness along with session and connection counts.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let sessions = state.registry().lock().await.session_count();
    HealthResponse::ok(sessions, state.connections().len())
}
