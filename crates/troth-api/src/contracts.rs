//! Handlers for `/contracts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/contracts` | Body: `{"title", "content", "partnerEmail"?}` |
//! | `GET`    | `/contracts` | Owned or partnered, newest first |
//! | `GET`    | `/contracts/:id` | 404 unless owner/partner/collaborator |
//! | `PUT`    | `/contracts/:id` | Owner only; others get 404 |
//! | `DELETE` | `/contracts/:id` | Owner only; cascades |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::{
  contract::{Contract, NewContract},
  store::ContractStore,
};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub title:         String,
  pub content:       String,
  pub partner_email: Option<String>,
}

/// `POST /contracts`
///
/// A `partnerEmail` here must belong to a registered user; inviting an
/// unregistered address goes through the external-share flow instead.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner_id): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.title.trim().is_empty() || body.content.trim().is_empty() {
    return Err(ApiError::Validation("title and content are required".into()));
  }

  let owner = state
    .store
    .user_by_id(owner_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

  let partner_id = match body.partner_email.as_deref() {
    None | Some("") => None,
    Some(email) => Some(
      state
        .store
        .user_by_email(email)
        .await
        .map_err(|e| ApiError::Store(Box::new(e)))?
        .ok_or_else(|| ApiError::NotFound("partner email not found".into()))?
        .user_id,
    ),
  };

  let contract = state
    .store
    .create_contract(NewContract {
      title:      body.title,
      content:    body.content,
      owner_id:   owner.user_id,
      partner_id,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "message": "contract created",
      "contractId": contract.contract_id,
    })),
  ))
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /contracts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
) -> Result<Json<Vec<Contract>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contracts = state
    .store
    .contracts_for_user(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(contracts))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /contracts/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Contract>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = state
    .store
    .contract_visible_to(id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("contract not found".into()))?;
  Ok(Json(contract))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub title:   String,
  pub content: String,
}

/// `PUT /contracts/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let updated = state
    .store
    .update_contract(id, user_id, body.title, body.content)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !updated {
    return Err(ApiError::NotFound("contract not found".into()));
  }
  Ok(Json(json!({ "message": "contract updated" })))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /contracts/:id`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let deleted = state
    .store
    .delete_contract(id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !deleted {
    return Err(ApiError::NotFound("contract not found".into()));
  }
  Ok(Json(json!({ "message": "contract deleted" })))
}
