//! Handler-boundary error type.
//!
//! Every failure leaving a handler is an [`ApiError`]; the response body is
//! always `{"message": ...}`. Internal details are logged, never returned.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;

use crate::database::SqlStorageError;
use crate::imaging::NormalizeError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many contributions, please try again later")]
    RateLimited { retry_after: Duration },

    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: StorageError,
    },

    #[error("{message}")]
    Database {
        message: String,
        #[source]
        source: SqlStorageError,
    },

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage(message: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    pub fn database(message: impl Into<String>, source: SqlStorageError) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage { .. } | Self::Database { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<NormalizeError> for ApiError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::Decode(_) => Self::validation("Invalid image data"),
            other => Self::Internal(format!("Failed to process image: {other}")),
        }
    }
}

// Extractor rejections, surfaced through `axum_extra::extract::WithRejection`.

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::Storage { message, source } => {
                tracing::error!(error = %source, "{message}");
                message.clone()
            }
            Self::Database { message, source } => {
                tracing::error!(error = %source, "{message}");
                message.clone()
            }
            Self::Internal(detail) => {
                tracing::error!("{detail}");
                "Internal server error".to_owned()
            }
            other => {
                tracing::debug!(status = %status, "{other}");
                other.to_string()
            }
        };

        let mut response = (status, Json(ErrorBody { message })).into_response();

        if let Self::RateLimited { retry_after } = self {
            // Round up so clients never retry a moment too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = ApiError::database(
            "Failed to save contribution",
            SqlStorageError::Db("connection refused on 10.0.0.3".to_owned()),
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(response).await,
            serde_json::json!({ "message": "Failed to save contribution" })
        );
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(41_200),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }

    #[tokio::test]
    async fn decode_failure_is_a_client_error() {
        let err: ApiError = crate::imaging::normalize_image(b"nope").unwrap_err().into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_of(err.into_response()).await["message"],
            "Invalid image data"
        );
    }
}
