//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! `NotFound` deliberately covers both true absence and authorization
//! denial on read paths — the two are indistinguishable to the client so
//! resource existence never leaks.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Malformed or missing input.
  #[error("{0}")]
  Validation(String),

  /// No credential presented.
  #[error("authentication required")]
  Unauthorized,

  /// A credential was presented but does not verify.
  #[error("invalid or expired token")]
  InvalidToken,

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  /// A uniqueness rule was violated. Surfaced as 400, not 409.
  #[error("{0}")]
  Duplicate(String),

  /// The outbound mail collaborator reported failure.
  #[error("email delivery failed: {0}")]
  Upstream(String),

  #[error("credential error: {0}")]
  Credentials(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Validation(_) | ApiError::Duplicate(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::InvalidToken | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Upstream(_) | ApiError::Credentials(_) | ApiError::Store(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "message": self.to_string() }))).into_response()
  }
}
