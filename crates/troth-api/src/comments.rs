//! Handlers for `/comments` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::{comment::CommentView, store::ContractStore};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /comments/:contract_id` — newest first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let comments = state
    .store
    .comments_for_contract(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub contract_id: Option<Uuid>,
  pub content:     Option<String>,
}

/// `POST /comments`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(author_id): Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(contract_id), Some(content)) = (body.contract_id, body.content) else {
    return Err(ApiError::Validation(
      "contractId and content are required".into(),
    ));
  };
  if content.trim().is_empty() {
    return Err(ApiError::Validation("comment content cannot be empty".into()));
  }

  if state
    .store
    .contract_by_id(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .is_none()
  {
    return Err(ApiError::NotFound("contract not found".into()));
  }

  let comment = state
    .store
    .create_comment(contract_id, author_id, content)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok((
    StatusCode::CREATED,
    Json(json!({ "message": "comment added", "comment": comment })),
  ))
}

/// `DELETE /comments/:id` — author only; everyone else sees 404.
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
    .delete_comment(id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !deleted {
    return Err(ApiError::NotFound("comment not found".into()));
  }
  Ok(Json(json!({ "message": "comment deleted" })))
}
