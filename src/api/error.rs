use crate::downloader::DownloadError;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the download endpoint, rendered as plain text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing URL or video ID")]
    MissingField,

    #[error("Invalid video ID")]
    InvalidVideoId,

    #[error("Failed to download video: {0}")]
    Download(DownloadError),

    #[error("Server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField | ApiError::InvalidVideoId => StatusCode::BAD_REQUEST,
            ApiError::Download(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(error: impl std::fmt::Display) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<DownloadError> for ApiError {
    fn from(error: DownloadError) -> Self {
        if error.is_tool_failure() {
            ApiError::Download(error)
        } else {
            ApiError::internal(error)
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        ApiError::internal(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingField.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidVideoId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::MissingField.to_string(),
            "Missing URL or video ID"
        );
        assert_eq!(
            ApiError::internal("disk full").to_string(),
            "Server error: disk full"
        );

        let timed_out: ApiError = DownloadError::TimedOut(Duration::from_secs(5)).into();
        assert_eq!(
            timed_out.to_string(),
            "Failed to download video: downloader timed out after 5s"
        );
    }

    #[test]
    fn test_spawn_failure_is_server_error() {
        let error: ApiError = DownloadError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ))
        .into();
        assert!(matches!(error, ApiError::Internal(_)));
        assert_eq!(
            error.to_string(),
            "Server error: failed to start downloader: no such file"
        );
    }
}
