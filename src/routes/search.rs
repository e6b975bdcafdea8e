use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::search::{SearchQuery, SearchResponse},
    error::{AppError, ErrorBody},
    services::search_service,
    state::SharedState,
};

/// Search tracks without joining a session.
#[utoipa::path(
    get,
    path = "/api/tracks/search",
    tag = "search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching tracks", body = SearchResponse),
        (status = 400, description = "Missing or invalid query", body = ErrorBody),
        (status = 502, description = "Search upstream unavailable", body = ErrorBody)
    )
)]
pub async fn search_tracks(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    Ok(Json(search_service::search_tracks(&state, query).await?))
}

/// Configure the search routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api/tracks/search", get(search_tracks))
}
