//! Handlers for `/referrals` endpoints.
//!
//! One code-bearing row per referrer; `register` and `payment-complete`
//! are conditional transitions in the store, so the pending → registered →
//! paid progression never regresses and never double-pays.

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::store::ContractStore;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// Reward for a completed referral, in cents.
const REFERRAL_REWARD_CENTS: i64 = 500;

fn referral_link(frontend_url: &str, code: &str) -> String {
  format!("{frontend_url}/register?ref={code}")
}

// ─── Generate ────────────────────────────────────────────────────────────────

/// `POST /referrals/generate` — returns the caller's existing code, or
/// mints one.
pub async fn generate<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if let Some(existing) = state
    .store
    .referral_for(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  {
    return Ok(Json(json!({
      "referralCode": existing.code,
      "referralLink": referral_link(&state.config.frontend_url, &existing.code),
    })));
  }

  let code = format!("REF-{}", &Uuid::new_v4().simple().to_string()[..8]);
  let referral = state
    .store
    .create_referral(user_id, code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(json!({
    "referralCode": referral.code,
    "referralLink": referral_link(&state.config.frontend_url, &referral.code),
  })))
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// `GET /referrals/stats/:user_id` — callers may only read their own stats.
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Authenticated(caller_id): Authenticated,
  Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if caller_id != user_id {
    return Err(ApiError::Forbidden("no access to these statistics".into()));
  }

  let summary = state
    .store
    .referral_stats(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  let referrals = state
    .store
    .referrals_for(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(json!({ "summary": summary, "referrals": referrals })))
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
  pub referral_code: Option<String>,
  pub email:         Option<String>,
}

/// `POST /referrals/register` — unauthenticated; called during signup with
/// a `?ref=` code.
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(code), Some(email)) = (body.referral_code, body.email) else {
    return Err(ApiError::Validation(
      "referralCode and email are required".into(),
    ));
  };

  if state
    .store
    .referral_by_code(&code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_none()
  {
    return Err(ApiError::NotFound("invalid referral code".into()));
  }

  let registered = state
    .store
    .register_referral(&code, email)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !registered {
    return Err(ApiError::Duplicate("referral code already used".into()));
  }

  Ok(Json(json!({ "message": "referral recorded" })))
}

// ─── Payment complete ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
  pub referral_code: Option<String>,
}

/// `POST /referrals/payment-complete`
pub async fn payment_complete<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Json(body): Json<PaymentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Some(code) = body.referral_code else {
    return Err(ApiError::Validation("referralCode is required".into()));
  };

  let paid = state
    .store
    .complete_referral(&code, REFERRAL_REWARD_CENTS)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !paid {
    return Err(ApiError::Validation(
      "referral is not in a payable state".into(),
    ));
  }

  Ok(Json(json!({ "message": "referral reward recorded" })))
}
