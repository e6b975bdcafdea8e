use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Track returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Track {
    /// Upstream identifier.
    pub id: String,
    /// Track title.
    pub title: String,
    /// Main artist.
    pub artist: String,
    /// Short audio preview, when the upstream has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Cover image, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art_url: Option<String>,
}

/// Query string of `GET /api/tracks/search`.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Free-text search terms.
    #[validate(length(min = 1, max = 100))]
    pub q: String,
}

/// Body of a successful track search.
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// Trimmed query the search ran with.
    pub query: String,
    /// Matches in upstream order.
    pub tracks: Vec<Track>,
}
