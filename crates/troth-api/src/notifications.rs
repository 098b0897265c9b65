//! Handler for `/notifications/send-email` — client-triggered invitation
//! and update mails for a contract.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use troth_core::store::ContractStore;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError, mailer::OutboundMail};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailBody {
  pub to:          Option<String>,
  #[serde(rename = "type")]
  pub kind:        Option<String>,
  pub contract_id: Option<Uuid>,
}

/// `POST /notifications/send-email`
pub async fn send_email<S>(
  State(state): State<AppState<S>>,
  Authenticated(user_id): Authenticated,
  Json(body): Json<SendEmailBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (Some(to), Some(kind), Some(contract_id)) = (body.to, body.kind, body.contract_id)
  else {
    return Err(ApiError::Validation(
      "to, type, and contractId are required".into(),
    ));
  };

  let contract = state
    .store
    .contract_by_id(contract_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("contract not found".into()))?;

  let sender = state
    .store
    .user_by_id(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

  let mail = match kind.as_str() {
    "invitation" => OutboundMail::Invitation {
      to,
      contract_title: contract.title,
      inviter_email:  sender.email,
    },
    "update" => OutboundMail::ContractUpdate {
      to,
      contract_title: contract.title,
      updater_email:  sender.email,
    },
    _ => return Err(ApiError::Validation("unknown notification type".into())),
  };

  state
    .mailer
    .send(mail)
    .await
    .map_err(|e| ApiError::Upstream(e.to_string()))?;

  Ok(Json(json!({ "message": "email sent" })))
}
