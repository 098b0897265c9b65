//! Bearer-token extractor for authenticated routes.
//!
//! Stateless: the JWT alone identifies the caller, no database lookup.
//! Handlers needing the live user row query separately.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use troth_core::store::ContractStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Present in a handler's arguments means the request carried a valid
/// session token; the payload is the caller's user id.
///
/// Missing header → 401. Present but unverifiable (bad signature, expired,
/// wrong shape) → 403.
pub struct Authenticated(pub Uuid);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header_val = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthorized)?;

    let token = header_val
      .strip_prefix("Bearer ")
      .ok_or(ApiError::Unauthorized)?;

    let user_id = state
      .tokens
      .verify_session(token)
      .map_err(|_| ApiError::InvalidToken)?;

    Ok(Authenticated(user_id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{path::PathBuf, sync::Arc};

  use axum::http::Request;
  use troth_store_sqlite::SqliteStore;

  use crate::{ServerConfig, credentials::TokenService, mailer::TracingMailer};

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:              "127.0.0.1".to_string(),
        port:              5600,
        store_path:        PathBuf::from(":memory:"),
        jwt_secret:        "test-secret".to_string(),
        session_ttl_hours: 24,
        share_ttl_days:    7,
        frontend_url:      "http://localhost:5173".to_string(),
      }),
      tokens: Arc::new(TokenService::new("test-secret", 24, 7)),
      mailer: Arc::new(TracingMailer),
    }
  }

  async fn extract(
    req: Request<axum::body::Body>,
    state: &AppState<SqliteStore>,
  ) -> Result<Authenticated, ApiError> {
    let (mut parts, _) = req.into_parts();
    Authenticated::from_request_parts(&mut parts, state).await
  }

  #[tokio::test]
  async fn valid_bearer_token() {
    let state = make_state().await;
    let id = Uuid::new_v4();
    let token = state.tokens.issue_session(id).unwrap();
    let req = Request::builder()
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(axum::body::Body::empty())
      .unwrap();
    let Authenticated(got) = extract(req, &state).await.unwrap();
    assert_eq!(got, id);
  }

  #[tokio::test]
  async fn missing_header_is_unauthorized() {
    let state = make_state().await;
    let req = Request::builder().body(axum::body::Body::empty()).unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn non_bearer_scheme_is_unauthorized() {
    let state = make_state().await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::Unauthorized)
    ));
  }

  #[tokio::test]
  async fn garbage_token_is_forbidden() {
    let state = make_state().await;
    let req = Request::builder()
      .header(header::AUTHORIZATION, "Bearer not.a.jwt")
      .body(axum::body::Body::empty())
      .unwrap();
    assert!(matches!(
      extract(req, &state).await,
      Err(ApiError::InvalidToken)
    ));
  }
}
