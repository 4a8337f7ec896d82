use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeMap;

/// Per-field validation messages, DRF-style: `{"title": ["Title is required"]}`.
/// BTreeMap so the rendered order is stable.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The three failure modes a handler can surface. Everything else is a
/// bug and belongs in `Internal`, whose detail is logged but never
/// echoed to the client.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// 400 with a flat `{"error": ...}` body.
    #[error("{0}")]
    Invalid(String),
    /// 400 with a per-field error map.
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::Invalid(msg.into())
    }

    /// Single-field validation failure.
    pub fn field(field: &str, msg: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![msg.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Invalid(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Invalid(msg) => json!({ "error": msg }),
            ApiError::Validation(errors) => serde_json::to_value(errors)
                .unwrap_or_else(|_| json!({ "error": "Invalid input" })),
            ApiError::NotFound(what) => json!({ "error": format!("{what} not found") }),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                json!({ "error": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
