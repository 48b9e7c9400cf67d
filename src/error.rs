//! Error taxonomy shared by every component.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not authorized: {0}")]
    Unauthorized(&'static str),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    InvalidOperation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for SocialError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(what) => SocialError::Conflict(what),
            other => SocialError::Storage(other),
        }
    }
}

impl SocialError {
    pub fn status(&self) -> StatusCode {
        match self {
            SocialError::NotFound(_) => StatusCode::NOT_FOUND,
            SocialError::Unauthorized(_) => StatusCode::FORBIDDEN,
            SocialError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SocialError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            SocialError::Conflict(_) => StatusCode::CONFLICT,
            SocialError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SocialError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

pub type SocialResult<T> = Result<T, SocialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SocialError::NotFound("post").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SocialError::Unauthorized("not the author").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(SocialError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            SocialError::InvalidOperation("empty".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SocialError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let err: SocialError = StorageError::AlreadyExists("email".into()).into();
        assert!(matches!(err, SocialError::Conflict(_)));
    }
}
