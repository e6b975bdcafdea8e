use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::dto::search::Track;

/// Maximum number of tracks requested from the upstream per search.
const SEARCH_LIMIT: u32 = 10;

/// Failures of the external track search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP client could not be built.
    #[error("failed to build search client: {source}")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Request could not be sent or the connection broke.
    #[error("search request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    /// Upstream answered with a non-success status.
    #[error("search upstream answered {status}")]
    Status { status: StatusCode },
    /// Upstream body was not the expected JSON.
    #[error("unexpected search response: {source}")]
    Decode {
        #[source]
        source: reqwest::Error,
    },
    /// Upstream did not answer in time.
    #[error("search upstream timed out")]
    Timeout,
}

impl SearchError {
    fn from_request(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Request { source }
        }
    }
}

/// Asynchronous collaborator returning tracks for a free-text query.
///
/// An empty result is `Ok(vec![])`; only upstream failures are errors.
pub trait TrackSearch: Send + Sync {
    fn search(&self, query: &str) -> BoxFuture<'static, Result<Vec<Track>, SearchError>>;
}

/// Track search backed by a Deezer-compatible JSON API.
#[derive(Clone)]
pub struct HttpTrackSearch {
    client: Client,
    base_url: Arc<str>,
}

impl HttpTrackSearch {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SearchError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    async fn run(self, query: String) -> Result<Vec<Track>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .client
            .get(url)
            .query(&[("q", query.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(SearchError::from_request)?;

        if !response.status().is_success() {
            return Err(SearchError::Status {
                status: response.status(),
            });
        }

        let body: SearchBody = response.json().await.map_err(|source| {
            if source.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Decode { source }
            }
        })?;
        Ok(body.into_tracks())
    }
}

impl TrackSearch for HttpTrackSearch {
    fn search(&self, query: &str) -> BoxFuture<'static, Result<Vec<Track>, SearchError>> {
        let search = self.clone();
        let query = query.trim().to_string();
        Box::pin(search.run(query))
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    data: Vec<RemoteTrack>,
}

#[derive(Debug, Deserialize)]
struct RemoteTrack {
    id: serde_json::Value,
    title: String,
    artist: RemoteArtist,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    album: Option<RemoteAlbum>,
}

#[derive(Debug, Deserialize)]
struct RemoteArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RemoteAlbum {
    #[serde(default)]
    cover_medium: Option<String>,
}

impl SearchBody {
    fn into_tracks(self) -> Vec<Track> {
        self.data
            .into_iter()
            .map(|remote| Track {
                id: match remote.id {
                    serde_json::Value::String(id) => id,
                    other => other.to_string(),
                },
                title: remote.title,
                artist: remote.artist.name,
                preview_url: remote.preview.filter(|url| !url.is_empty()),
                album_art_url: remote.album.and_then(|album| album.cover_medium),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_upstream_payload() {
        let body: SearchBody = serde_json::from_str(
            r#"{
                "data": [
                    {
                        "id": 3135556,
                        "title": "Harder, Better, Faster, Stronger",
                        "preview": "https://cdn.example/preview.mp3",
                        "artist": { "name": "Daft Punk" },
                        "album": { "cover_medium": "https://cdn.example/cover.jpg" }
                    },
                    {
                        "id": "abc",
                        "title": "Untitled",
                        "preview": "",
                        "artist": { "name": "Unknown" }
                    }
                ],
                "total": 2
            }"#,
        )
        .unwrap();

        let tracks = body.into_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "3135556");
        assert_eq!(tracks[0].artist, "Daft Punk");
        assert_eq!(
            tracks[0].album_art_url.as_deref(),
            Some("https://cdn.example/cover.jpg")
        );
        assert_eq!(tracks[1].id, "abc");
        assert_eq!(tracks[1].preview_url, None);
        assert_eq!(tracks[1].album_art_url, None);
    }

    #[test]
    fn missing_data_is_an_empty_result() {
        let body: SearchBody = serde_json::from_str(r#"{ "total": 0 }"#).unwrap();
        assert!(body.into_tracks().is_empty());
    }

    #[test]
    fn search_errors_surface_as_upstream_unavailable() {
        let err = crate::error::ServiceError::from(SearchError::Timeout);
        assert_eq!(
            err.code(),
            crate::error::ErrorCode::UpstreamUnavailable
        );
    }
}
