//! Handlers for `/external-approval` endpoints.
//!
//! The owner sends a contract out for approval (`send`, bearer-auth); the
//! partner then views and decides through unauthenticated endpoints where
//! the token in the URL is the whole credential. The token is matched
//! against its stored copy on the contract row.
//!
//! `accepted` and `rejected` are terminal: both transitions run as one
//! conditional update in the store, so once either lands the other can only
//! observe 404.

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use troth_core::{
  contract::{ApprovalStatus, Contract},
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

/// `POST /external-approval/send` — owner only.
///
/// Issues the approval token, stores it with the partner email on the
/// contract, then emails the deep link. The rows are committed before the
/// email goes out; a delivery failure surfaces as 500 without rollback.
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
    .ok_or_else(|| ApiError::NotFound("contract not found".into()))?;

  let token = state
    .tokens
    .issue_approval(contract_id, &partner_email)
    .map_err(|e| ApiError::Credentials(e.to_string()))?;

  let stored = state
    .store
    .set_approval_token(contract_id, owner_id, partner_email.clone(), token.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if !stored {
    return Err(ApiError::NotFound("contract not found".into()));
  }

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
      link: format!("{}/external-approval/{token}", state.config.frontend_url),
    })
    .await
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

  Ok(Json(json!({
    "message": "contract sent for approval",
    "approvalToken": token,
  })))
}

// ─── View ────────────────────────────────────────────────────────────────────

/// The contract's public fields as shown to the approving partner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalView {
  pub id:                      Uuid,
  pub title:                   String,
  pub content:                 String,
  pub owner_email:             String,
  pub partner_email:           String,
  pub status:                  troth_core::contract::ContractStatus,
  pub partner_approval_status: ApprovalStatus,
  pub created_at:              chrono::DateTime<chrono::Utc>,
}

/// `GET /external-approval/view/:token` — no auth; the token is the
/// credential.
pub async fn view<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
) -> Result<Json<ApprovalView>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = state
    .store
    .contract_by_approval_token(&token)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("contract not found or link invalid".into()))?;

  let Some(partner_email) = contract.partner_email.clone() else {
    return Err(ApiError::Validation(
      "no partner is defined for this contract".into(),
    ));
  };
  if contract.approval_status == ApprovalStatus::Approved {
    return Err(ApiError::Validation(
      "this contract has already been approved".into(),
    ));
  }

  let owner = state
    .store
    .user_by_id(contract.owner_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("contract not found or link invalid".into()))?;

  Ok(Json(ApprovalView {
    id:                      contract.contract_id,
    title:                   contract.title,
    content:                 contract.content,
    owner_email:             owner.email,
    partner_email,
    status:                  contract.status,
    partner_approval_status: contract.approval_status,
    created_at:              contract.created_at,
  }))
}

// ─── Approve / reject ────────────────────────────────────────────────────────

/// `POST /external-approval/approve/:token`
pub async fn approve<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = state
    .store
    .approve_contract(&token)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound("contract not found, link invalid, or already decided".into())
    })?;

  tracing::info!(contract_id = %contract.contract_id, "contract approved via token");
  notify_owner(&state, &contract, "approved").await;

  Ok(Json(json!({
    "message": "contract approved",
    "contractId": contract.contract_id,
  })))
}

/// `POST /external-approval/reject/:token`
pub async fn reject<S>(
  State(state): State<AppState<S>>,
  Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = state
    .store
    .reject_contract(&token)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| {
      ApiError::NotFound("contract not found, link invalid, or already decided".into())
    })?;

  tracing::info!(contract_id = %contract.contract_id, "contract rejected via token");
  notify_owner(&state, &contract, "rejected").await;

  Ok(Json(json!({
    "message": "contract rejected",
    "contractId": contract.contract_id,
  })))
}

/// Tell the owner about the partner's decision. The transition has already
/// committed, so a failed dispatch is logged and swallowed.
async fn notify_owner<S>(state: &AppState<S>, contract: &Contract, decision: &str)
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let owner = match state.store.user_by_id(contract.owner_id).await {
    Ok(Some(owner)) => owner,
    Ok(None) => return,
    Err(e) => {
      tracing::warn!(error = %e, "owner lookup for decision notification failed");
      return;
    }
  };

  let mail = OutboundMail::Decision {
    to:             owner.email,
    contract_title: contract.title.clone(),
    partner_email:  contract.partner_email.clone().unwrap_or_default(),
    decision:       decision.to_string(),
  };
  if let Err(e) = state.mailer.send(mail).await {
    tracing::warn!(error = %e, "decision notification failed");
  }
}
