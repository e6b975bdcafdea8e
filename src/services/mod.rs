/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Stateless track search endpoint logic.
pub mod search_service;
/// Registry access for connection events and client messages.
pub mod session_service;
/// Background inactivity sweep.
pub mod sweeper;
/// Ticker tasks driving armed countdowns.
pub mod timer_service;
/// External track search client.
pub mod track_search;
/// WebSocket connection and message handling service.
pub mod websocket_service;
