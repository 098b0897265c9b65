//! Handlers for `/auth` endpoints: registration, login, token check.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use troth_core::store::ContractStore;

use crate::{
  AppState,
  auth::Authenticated,
  credentials::{hash_password, verify_password},
  error::ApiError,
};

const MIN_PASSWORD_LEN: usize = 6;

/// Minimal shape check: one `@`, non-empty local part, a dot in the domain,
/// no whitespace anywhere. Shared with the share/approval send handlers.
pub(crate) fn is_valid_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
    }
    None => false,
  }
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:    Option<String>,
  pub password: Option<String>,
}

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let email = body
    .email
    .ok_or_else(|| ApiError::Validation("email and password are required".into()))?;
  let password = body
    .password
    .ok_or_else(|| ApiError::Validation("email and password are required".into()))?;

  if !is_valid_email(&email) {
    return Err(ApiError::Validation("invalid email format".into()));
  }
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::Validation(format!(
      "password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }

  let hash = hash_password(&password)
    .map_err(|e| ApiError::Credentials(e.to_string()))?;

  let user = state
    .store
    .create_user(email, hash)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::Duplicate("email already registered".into()))?;

  tracing::info!(user_id = %user.user_id, "user registered");

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "message": "user registered",
      "userId": user.user_id,
    })),
  ))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    Option<String>,
  pub password: Option<String>,
}

/// `POST /auth/login`
///
/// Unknown email and wrong password collapse into the same 401 so the
/// endpoint cannot be used as a registration oracle.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(email), Some(password)) = (body.email, body.password) else {
    return Err(ApiError::Unauthorized);
  };

  let user = state
    .store
    .user_by_email(&email)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or(ApiError::Unauthorized)?;

  if !verify_password(&password, &user.password_hash) {
    return Err(ApiError::Unauthorized);
  }

  let token = state
    .tokens
    .issue_session(user.user_id)
    .map_err(|e| ApiError::Credentials(e.to_string()))?;

  Ok(Json(json!({
    "token": token,
    "user": { "id": user.user_id, "email": user.email },
  })))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

/// `GET /auth/verify` — confirms the bearer token still maps to a live user.
pub async fn verify<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let user = state
    .store
    .user_by_id(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

  Ok(Json(json!({
    "message": "token valid",
    "user": { "id": user.user_id, "email": user.email },
  })))
}

#[cfg(test)]
mod tests {
  use super::is_valid_email;

  #[test]
  fn email_shapes() {
    assert!(is_valid_email("a@x.com"));
    assert!(is_valid_email("first.last@sub.example.org"));
    assert!(!is_valid_email("no-at-sign"));
    assert!(!is_valid_email("@x.com"));
    assert!(!is_valid_email("a@nodot"));
    assert!(!is_valid_email("a@x.com "));
    assert!(!is_valid_email("a b@x.com"));
    assert!(!is_valid_email("a@.com"));
  }
}
