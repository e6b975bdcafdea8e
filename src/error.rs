use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors};

use crate::services::track_search::SearchError;

/// Errors produced by orchestration operations.
///
/// Every variant except [`ServiceError::Expired`] terminates only the action that caused
/// it and is reported to the requesting connection alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Unknown session code.
    #[error("session `{0}` not found")]
    NotFound(String),
    /// Host-only action attempted by another player, or an actor outside the allowed set.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Action is not legal in the current phase.
    #[error("invalid phase: {0}")]
    InvalidPhase(String),
    /// Action conflicts with existing state (duplicate submission, already joined).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Session already holds the maximum number of players.
    #[error("session is full ({0} players)")]
    Full(usize),
    /// Display name already used by a connected player.
    #[error("name `{0}` is already taken")]
    NameTaken(String),
    /// External track search failed.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Session was swept for inactivity.
    #[error("session expired due to inactivity")]
    Expired,
    /// Malformed or invalid client payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Could not allocate a free session code.
    #[error("no session code available")]
    CapacityExceeded,
}

/// Stable machine-readable error identifiers sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown session, player or connection.
    NotFound,
    /// Caller lacks the role the operation needs.
    Forbidden,
    /// Operation does not fit the current game phase.
    InvalidPhase,
    /// Connection is already in a session.
    Conflict,
    /// Session reached its player limit.
    Full,
    /// Display name already used in the session.
    NameTaken,
    /// Track search collaborator failed.
    UpstreamUnavailable,
    /// Session was swept for inactivity.
    Expired,
    /// Malformed or invalid request.
    InvalidInput,
    /// Server cannot hold more sessions.
    CapacityExceeded,
}

impl ServiceError {
    /// Wire identifier of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::Forbidden(_) => ErrorCode::Forbidden,
            ServiceError::InvalidPhase(_) => ErrorCode::InvalidPhase,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::Full(_) => ErrorCode::Full,
            ServiceError::NameTaken(_) => ErrorCode::NameTaken,
            ServiceError::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            ServiceError::Expired => ErrorCode::Expired,
            ServiceError::InvalidInput(_) => ErrorCode::InvalidInput,
            ServiceError::CapacityExceeded => ErrorCode::CapacityExceeded,
        }
    }

    /// Whether the error belongs to the conflict class (full, name taken, duplicates).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Conflict(_) | ServiceError::Full(_) | ServiceError::NameTaken(_)
        )
    }
}

impl From<SearchError> for ServiceError {
    fn from(err: SearchError) -> Self {
        ServiceError::UpstreamUnavailable(err.to_string())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        let message = err
            .message
            .map(|message| message.to_string())
            .unwrap_or_else(|| err.code.to_string());
        ServiceError::InvalidInput(message)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// An upstream collaborator failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(_) | ServiceError::Expired => AppError::NotFound(message),
            ServiceError::Forbidden(_) => AppError::Forbidden(message),
            ServiceError::InvalidPhase(_)
            | ServiceError::Conflict(_)
            | ServiceError::Full(_)
            | ServiceError::NameTaken(_) => AppError::Conflict(message),
            ServiceError::UpstreamUnavailable(_) => AppError::BadGateway(message),
            ServiceError::InvalidInput(_) => AppError::BadRequest(message),
            ServiceError::CapacityExceeded => AppError::ServiceUnavailable(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
/// JSON body returned alongside every HTTP error status.
pub struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_class_covers_full_and_name_taken() {
        assert!(ServiceError::Full(15).is_conflict());
        assert!(ServiceError::NameTaken("Bob".into()).is_conflict());
        assert!(!ServiceError::Expired.is_conflict());
        assert_eq!(ServiceError::Full(15).code(), ErrorCode::Full);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let response = AppError::from(ServiceError::UpstreamUnavailable("down".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
