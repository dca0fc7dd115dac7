//! The eight-kind error taxonomy shared by every component, and its mapping
//! onto HTTP status codes for the handlers in [`crate::handlers`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("graph query failed: {0}")]
    Graph(String),

    #[error("metrics backend failed: {0}")]
    Metrics(String),

    #[error("remediation action failed: {0}")]
    Remediation(String),

    #[error("validation probe failed: {0}")]
    Validation(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ForgeError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<std::io::Error> for ForgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Graph(e.to_string())
    }
}

/// Only `Config` is fatal (handled at startup, never reaches a handler).
/// `Storage` maps to 500, `Graph`/`Metrics`/
/// `Remediation`/`Validation` surface with structured detail, `NotFound`
/// maps to 404. `Llm` is recovered internally by the orchestrator and
/// should never reach this impl in practice.
impl IntoResponse for ForgeError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            Self::Graph(_) => (StatusCode::BAD_GATEWAY, "graph"),
            Self::Metrics(_) => (StatusCode::BAD_GATEWAY, "metrics"),
            Self::Remediation(_) => (StatusCode::BAD_GATEWAY, "remediation"),
            Self::Validation(_) => (StatusCode::BAD_GATEWAY, "validation"),
            Self::Llm(_) => (StatusCode::BAD_GATEWAY, "llm"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };
        let body = Json(json!({ "error": kind, "detail": self.to_string() }));
        (status, body).into_response()
    }
}

pub type ForgeResult<T> = Result<T, ForgeError>;
