//! Library crate for party-host-back, exposing modules for binaries and integration tests.

pub mod config;
/// Wire types exchanged with clients.
pub mod dto;
/// Error types and their HTTP and WebSocket mappings.
pub mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Glue between routes, the registry and the runtime.
pub mod services;
/// Sessions, games and timers.
pub mod state;
