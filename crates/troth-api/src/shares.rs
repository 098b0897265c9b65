//! Handlers for `/external-share` endpoints — partner invitations addressed
//! to an email rather than an account.
//!
//! Unlike the approval flow, the share endpoints re-verify the signed token
//! and then match the row on (token, embedded email); client-supplied ids
//! are never trusted. The invitee's decision is recorded on the share under
//! a conditional update and mirrored onto the contract.

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::{
  contract::ContractStatus,
  share::ShareView,
  store::ContractStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Authenticated,
  error::ApiError,
  mailer::OutboundMail,
  sessions::is_valid_email,
};

// ─── Send ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
  pub contract_id:   Option<Uuid>,
  pub partner_email: Option<String>,
}

/// `POST /external-share/send` — owner only.
///
/// If the email happens to belong to a registered user, a collaboration
/// invite is recorded as well (dual bookkeeping, preserved from the
/// original workflow). The share row and any invite are committed before
/// the email is attempted; `EmailDeliveryFailed` leaves them in place.
pub async fn send<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(contract_id), Some(partner_email)) = (body.contract_id, body.partner_email)
  else {
    return Err(ApiError::Validation(
      "contractId and partnerEmail are required".into(),
    ));
  };
  if !is_valid_email(&partner_email) {
    return Err(ApiError::Validation("invalid partner email".into()));
  }

  let contract = state
    .store
    .contract_by_id(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|c| c.owner_id == owner_id)
    .ok_or_else(|| {
      ApiError::NotFound("contract not found or you cannot share it".into())
    })?;

  // Dual bookkeeping: a registered partner also gets a collaboration
  // invite. A duplicate invite here is not an error for the share flow.
  if let Some(registered) = state
    .store
    .user_by_email(&partner_email)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  {
    state
      .store
      .create_invite(contract_id, owner_id, registered.user_id)
      .await
      .map_err(|e| ApiError::Store(Box::new(e)))?;
  }

  let token = state
    .tokens
    .issue_share(contract_id, &partner_email)
    .map_err(|e| ApiError::Credentials(e.to_string()))?;

  state
    .store
    .create_share(contract_id, owner_id, partner_email.clone(), token.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::Duplicate("this contract is already shared with that email".into())
    })?;

  let owner = state
    .store
    .user_by_id(owner_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

  state
    .mailer
    .send(OutboundMail::ShareLink {
      to:             partner_email,
      contract_title: contract.title,
      owner_email:    owner.email,
      link: format!("{}/external-share/{token}", state.config.frontend_url),
    })
    .await
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

  Ok(Json(json!({
    "message": "contract shared",
    "shareToken": token,
  })))
}

// ─── View ────────────────────────────────────────────────────────────────────

/// `GET /external-share/view/:token` — no auth; the signed token is the
/// credential and names the only email whose share row it can open.
pub async fn view<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
) -> Result<Json<ShareView>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let claims = state
    .tokens
    .verify_share(&token)
    .map_err(|_| ApiError::InvalidToken)?;

  let share = state
    .store
    .share_view(&token, &claims.email)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("share not found or expired".into()))?;

  Ok(Json(share))
}

// ─── Respond ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RespondBody {
  pub status: Option<String>,
}

/// `POST /external-share/respond/:token`
pub async fn respond<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
  Json(body): Json<RespondBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let decision = body
    .status
    .as_deref()
    .and_then(|s| s.parse::<ContractStatus>().ok())
    .filter(|s| matches!(s, ContractStatus::Accepted | ContractStatus::Rejected))
    .ok_or_else(|| ApiError::Validation("status must be accepted or rejected".into()))?;

  let claims = state
    .tokens
    .verify_share(&token)
    .map_err(|_| ApiError::InvalidToken)?;

  let share = state
    .store
    .respond_share(&token, &claims.email, decision)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound("share not found or already responded".into())
    })?;

  // Mirror the decision onto the parent contract. The share row is the
  // arbiter; this write is unconditional.
  state
    .store
    .set_contract_status(share.contract_id, decision)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::info!(
    contract_id = %share.contract_id,
    decision = decision.as_str(),
    "external share answered"
  );

  Ok(Json(json!({ "message": "response recorded" })))
}
