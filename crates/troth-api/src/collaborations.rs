//! Handlers for `/collaborations` endpoints: inviting registered users and
//! accepting their invites.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::{
  collab::{CollaboratorView, InviteView},
  store::ContractStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Invite ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteBody {
  pub contract_id:   Option<Uuid>,
  pub invited_email: Option<String>,
}

/// `POST /collaborations/invite`
pub async fn invite<S>(
  State(state): State<AppState<S>>,
  Authenticated(inviter_id): Authenticated,
  Json(body): Json<InviteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(contract_id), Some(invited_email)) = (body.contract_id, body.invited_email)
  else {
    return Err(ApiError::Validation(
      "contractId and invitedEmail are required".into(),
    ));
  };

  // Only the owner may invite; a missing contract is reported the same way.
  let owns = state
    .store
    .contract_by_id(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_some_and(|c| c.owner_id == inviter_id);
  if !owns {
    return Err(ApiError::Forbidden(
      "contract not found or you cannot invite to it".into(),
    ));
  }

  let invitee = state
    .store
    .user_by_email(&invited_email)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("invited user not found".into()))?;

  if state
    .store
    .invite_exists(contract_id, invitee.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  {
    return Err(ApiError::Duplicate("this user has already been invited".into()));
  }

  // The unique constraint catches the race two concurrent invites can win
  // past the check above; the second writer still loses.
  state
    .store
    .create_invite(contract_id, inviter_id, invitee.user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::Duplicate("this user has already been invited".into()))?;

  Ok((StatusCode::CREATED, Json(json!({ "message": "invite sent" }))))
}

// ─── List collaborators ──────────────────────────────────────────────────────

/// `GET /collaborations/list/:contract_id` — owner or accepted collaborator.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<CollaboratorView>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if state
    .store
    .contract_by_id(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_none()
  {
    return Err(ApiError::NotFound("contract not found".into()));
  }

  if !state
    .store
    .has_contract_access(contract_id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  {
    return Err(ApiError::Forbidden("no access to this contract".into()));
  }

  let collaborators = state
    .store
    .collaborators_for_contract(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(collaborators))
}

// ─── Accept ──────────────────────────────────────────────────────────────────

/// `POST /collaborations/accept/:invite_id`
///
/// Only the invitee named on a pending invite may accept; every other case
/// (wrong caller, unknown id, already accepted) is a uniform 404.
pub async fn accept<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(invite_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let accepted = state
    .store
    .accept_invite(invite_id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !accepted {
    return Err(ApiError::NotFound("invite not found or already accepted".into()));
  }
  Ok(Json(json!({ "message": "invite accepted" })))
}

// ─── My invites ──────────────────────────────────────────────────────────────

/// `GET /collaborations/invites` — pending invites addressed to the caller.
pub async fn my_invites<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
) -> Result<Json<Vec<InviteView>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let invites = state
    .store
    .pending_invites_for(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(invites))
}
