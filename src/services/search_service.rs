use tracing::warn;
use validator::Validate;

use crate::{
    dto::search::{SearchQuery, SearchResponse},
    error::{AppError, ServiceError},
    state::SharedState,
};

/// Validate the query and forward it to the track search collaborator.
pub async fn search_tracks(
    state: &SharedState,
    query: SearchQuery,
) -> Result<SearchResponse, AppError> {
    query.validate()?;
    let terms = query.q.trim().to_string();
    if terms.is_empty() {
        return Err(AppError::BadRequest("query must not be blank".into()));
    }

    let tracks = state.track_search().search(&terms).await.map_err(|err| {
        warn!(query = %terms, error = %err, "track search failed");
        ServiceError::from(err)
    })?;
    Ok(SearchResponse {
        query: terms,
        tracks,
    })
}
