//! Handlers for `/templates` endpoints.
//!
//! Reads expose the public catalog; create/update/delete are the
//! admin-style surface (bearer-authenticated, no extra role model).

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use troth_core::{
  store::ContractStore,
  template::{NewTemplate, Template},
};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /templates` — public catalog, alphabetical.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
) -> Result<Json<Vec<Template>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let templates = state
    .store
    .list_templates()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(templates))
}

/// `GET /templates/category/:category`
pub async fn by_category<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Path(category): Path<String>,
) -> Result<Json<Vec<Template>>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let templates = state
    .store
    .templates_by_category(&category)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(templates))
}

/// `GET /templates/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let template = state
    .store
    .template_by_id(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("template not found".into()))?;
  Ok(Json(template))
}

// ─── Instantiate ─────────────────────────────────────────────────────────────

/// `POST /templates/:id/create-contract`
///
/// Lookup and insert run in one transaction; a missing template leaves no
/// orphan contract behind.
pub async fn instantiate<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contract = state
    .store
    .instantiate_template(id, user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("template not found".into()))?;

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "message": "contract created from template",
      "contractId": contract.contract_id,
    })),
  ))
}

// ─── Admin surface ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBody {
  pub title:       String,
  pub content:     String,
  pub description: Option<String>,
  pub category:    Option<String>,
  #[serde(default = "default_public")]
  pub is_public:   bool,
}

fn default_public() -> bool { true }

impl From<TemplateBody> for NewTemplate {
  fn from(body: TemplateBody) -> Self {
    NewTemplate {
      title:       body.title,
      content:     body.content,
      description: body.description,
      category:    body.category,
      is_public:   body.is_public,
    }
  }
}

/// `POST /templates`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Json(body): Json<TemplateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if body.title.trim().is_empty() || body.content.trim().is_empty() {
    return Err(ApiError::Validation("title and content are required".into()));
  }

  let template = state
    .store
    .create_template(body.into())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(template)))
}

/// `PUT /templates/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Path(id): Path<Uuid>,
  Json(body): Json<TemplateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let updated = state
    .store
    .update_template(id, body.into())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !updated {
    return Err(ApiError::NotFound("template not found".into()));
  }
  Ok(Json(json!({ "message": "template updated" })))
}

/// `DELETE /templates/:id`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(_user_id): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let deleted = state
    .store
    .delete_template(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  if !deleted {
    return Err(ApiError::NotFound("template not found".into()));
  }
  Ok(Json(json!({ "message": "template deleted" })))
}
