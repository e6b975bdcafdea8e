use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Health check route.
pub mod health;
/// Track search route.
pub mod search;
/// Player WebSocket route.
pub mod websocket;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(search::router())
        .merge(docs::router())
        .with_state(state)
}
