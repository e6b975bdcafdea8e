use utoipa::OpenApi;

/// Aggregated OpenAPI document for Party Host Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::search::search_tracks,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::search::Track,
            crate::dto::search::SearchResponse,
            crate::error::ErrorBody,
            crate::error::ErrorCode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "search", description = "Stateless track search"),
        (name = "players", description = "WebSocket channel for party players"),
    )
)]
pub struct ApiDoc;
