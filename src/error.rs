//! Error taxonomy shared by the router and gateway.
//!
//! Three kinds, mapped 1:1 to transport status codes: `Validation` (400,
//! client-caused), `NotFound` (404), `Internal` (500, wraps the underlying
//! failure). Nothing is retried; each error is translated exactly once at
//! the gateway boundary into a JSON `{error, details}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required field.
    #[error("{0}")]
    Validation(String),

    /// Unknown route or resource.
    #[error("{0}")]
    NotFound(String),

    /// Backing-store failure, inference failure, or unexpected condition.
    /// `summary` is the stable user-visible string; `source` carries the
    /// underlying message exposed in the `details` field.
    #[error("{summary}")]
    Internal {
        summary: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(summary: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Internal {
            summary: summary.into(),
            source,
        }
    }

    /// Replace the user-visible summary of an internal error, leaving the
    /// underlying cause untouched. No-op for client-caused kinds.
    pub fn summarized(self, summary: &str) -> Self {
        match self {
            Self::Internal { source, .. } => Self::Internal {
                summary: summary.to_string(),
                source,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(source: anyhow::Error) -> Self {
        Self::Internal {
            summary: "Internal error".to_string(),
            source,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Validation(msg) => serde_json::json!({ "error": msg }),
            Self::NotFound(msg) => serde_json::json!({ "error": msg }),
            Self::Internal { summary, source } => {
                tracing::error!(error = %source, "{summary}");
                serde_json::json!({ "error": summary, "details": source.to_string() })
            }
        };
        (self.status(), Json(body)).into_response()
    }
}
