//! JSON REST layer for Troth.
//!
//! Exposes an axum [`Router`] backed by any
//! [`troth_core::store::ContractStore`]. Authenticated routes carry a
//! bearer JWT checked by the [`auth::Authenticated`] extractor; the
//! external-approval and external-share surfaces are unauthenticated and
//! self-authenticate through the signed tokens in their URLs.

pub mod approval;
pub mod auth;
pub mod collaborations;
pub mod comments;
pub mod contracts;
pub mod credentials;
pub mod error;
pub mod mailer;
pub mod notifications;
pub mod referrals;
pub mod seed;
pub mod sessions;
pub mod shares;
pub mod templates;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use troth_core::store::ContractStore;

use credentials::TokenService;
use mailer::Mailer;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_session_ttl_hours() -> i64 { 24 }
fn default_share_ttl_days() -> i64 { 7 }
fn default_frontend_url() -> String { "http://localhost:5173".to_string() }

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Secret for every signed token; process-wide, read-only after startup.
  pub jwt_secret: String,
  #[serde(default = "default_session_ttl_hours")]
  pub session_ttl_hours: i64,
  #[serde(default = "default_share_ttl_days")]
  pub share_ttl_days: i64,
  /// Base URL for the deep links embedded in outbound mail.
  #[serde(default = "default_frontend_url")]
  pub frontend_url: String,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ContractStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub tokens: Arc<TokenService>,
  pub mailer: Arc<dyn Mailer>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ContractStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Auth
    .route("/auth/register", post(sessions::register::<S>))
    .route("/auth/login",    post(sessions::login::<S>))
    .route("/auth/verify",   get(sessions::verify::<S>))
    // Contracts
    .route(
      "/contracts",
      get(contracts::list::<S>).post(contracts::create::<S>),
    )
    .route(
      "/contracts/{id}",
      get(contracts::get_one::<S>)
        .put(contracts::update::<S>)
        .delete(contracts::delete::<S>),
    )
    // Collaborations
    .route("/collaborations/invite",             post(collaborations::invite::<S>))
    .route("/collaborations/list/{contract_id}", get(collaborations::list::<S>))
    .route("/collaborations/accept/{invite_id}", post(collaborations::accept::<S>))
    .route("/collaborations/invites",            get(collaborations::my_invites::<S>))
    // Comments
    .route("/comments", post(comments::create::<S>))
    .route(
      "/comments/{id}",
      get(comments::list::<S>).delete(comments::delete::<S>),
    )
    // External approval (unauthenticated except send)
    .route("/external-approval/send",            post(approval::send::<S>))
    .route("/external-approval/view/{token}",    get(approval::view::<S>))
    .route("/external-approval/approve/{token}", post(approval::approve::<S>))
    .route("/external-approval/reject/{token}",  post(approval::reject::<S>))
    // External shares (unauthenticated except send)
    .route("/external-share/send",            post(shares::send::<S>))
    .route("/external-share/view/{token}",    get(shares::view::<S>))
    .route("/external-share/respond/{token}", post(shares::respond::<S>))
    // Templates
    .route(
      "/templates",
      get(templates::list::<S>).post(templates::create::<S>),
    )
    .route("/templates/category/{category}", get(templates::by_category::<S>))
    .route(
      "/templates/{id}",
      get(templates::get_one::<S>)
        .put(templates::update::<S>)
        .delete(templates::delete::<S>),
    )
    .route("/templates/{id}/create-contract", post(templates::instantiate::<S>))
    // Referrals
    .route("/referrals/generate",         post(referrals::generate::<S>))
    .route("/referrals/stats/{user_id}",  get(referrals::stats::<S>))
    .route("/referrals/register",         post(referrals::register::<S>))
    .route("/referrals/payment-complete", post(referrals::payment_complete::<S>))
    // Notifications
    .route("/notifications/send-email", post(notifications::send_email::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
  Json(json!({ "status": "OK" }))
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use troth_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use crate::mailer::{MailError, MailFuture, OutboundMail, TracingMailer};

  // ── Test doubles ──────────────────────────────────────────────────────────

  struct RecordingMailer(Mutex<Vec<OutboundMail>>);

  impl RecordingMailer {
    fn new() -> Arc<Self> { Arc::new(Self(Mutex::new(Vec::new()))) }

    fn sent(&self) -> Vec<OutboundMail> { self.0.lock().unwrap().clone() }
  }

  impl Mailer for RecordingMailer {
    fn send(&self, mail: OutboundMail) -> MailFuture<'_> {
      self.0.lock().unwrap().push(mail);
      Box::pin(async { Ok(()) })
    }
  }

  struct FailingMailer;

  impl Mailer for FailingMailer {
    fn send(&self, _mail: OutboundMail) -> MailFuture<'_> {
      Box::pin(async { Err(MailError("smtp unreachable".to_string())) })
    }
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn make_state_with(mailer: Arc<dyn Mailer>) -> AppState<SqliteStore> {
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
      mailer,
    }
  }

  async fn make_state() -> AppState<SqliteStore> {
    make_state_with(Arc::new(TracingMailer)).await
  }

  async fn request(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(value) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  /// Register a user and log them in; returns (session token, user id).
  async fn signup(
    state: &AppState<SqliteStore>,
    email: &str,
    password: &str,
  ) -> (String, Uuid) {
    let resp = request(
      state,
      "POST",
      "/auth/register",
      None,
      Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user_id: Uuid =
      serde_json::from_value(json_body(resp).await["userId"].clone()).unwrap();

    let resp = request(
      state,
      "POST",
      "/auth/login",
      None,
      Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = json_body(resp).await["token"].as_str().unwrap().to_string();

    (token, user_id)
  }

  /// Create a contract and return its id.
  async fn make_contract(
    state: &AppState<SqliteStore>,
    token: &str,
    title: &str,
  ) -> Uuid {
    let resp = request(
      state,
      "POST",
      "/contracts",
      Some(token),
      Some(json!({ "title": title, "content": "Clause 1: be kind." })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    serde_json::from_value(json_body(resp).await["contractId"].clone()).unwrap()
  }

  // ── Health ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_needs_no_auth() {
    let state = make_state().await;
    let resp = request(&state, "GET", "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  // ── Auth ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_login_verify_round_trip() {
    let state = make_state().await;
    let (token, user_id) = signup(&state, "a@x.com", "secret1").await;

    let resp = request(&state, "GET", "/auth/verify", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["id"], json!(user_id));
  }

  #[tokio::test]
  async fn register_rejects_bad_input() {
    let state = make_state().await;

    let resp = request(
      &state,
      "POST",
      "/auth/register",
      None,
      Some(json!({ "email": "not-an-email", "password": "secret1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(
      &state,
      "POST",
      "/auth/register",
      None,
      Some(json!({ "email": "a@x.com", "password": "short" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(
      &state,
      "POST",
      "/auth/register",
      None,
      Some(json!({ "email": "a@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn duplicate_registration_is_rejected() {
    let state = make_state().await;
    signup(&state, "a@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      "/auth/register",
      None,
      Some(json!({ "email": "a@x.com", "password": "secret2" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn login_with_bad_credentials_is_401() {
    let state = make_state().await;
    signup(&state, "a@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      "/auth/login",
      None,
      Some(json!({ "email": "a@x.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = request(
      &state,
      "POST",
      "/auth/login",
      None,
      Some(json!({ "email": "ghost@x.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn missing_and_invalid_tokens_split_401_403() {
    let state = make_state().await;

    let resp = request(&state, "GET", "/contracts", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = request(&state, "GET", "/contracts", Some("not.a.jwt"), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  // ── Contracts ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn contract_is_invisible_to_strangers() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    // Appears in the owner's list.
    let resp = request(&state, "GET", "/contracts", Some(&alice), None).await;
    let listed = json_body(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["title"], "Loyalty");

    // Every access by B reads as absence.
    for (method, body) in [
      ("GET", None),
      ("PUT", Some(json!({ "title": "X", "content": "Y" }))),
      ("DELETE", None),
    ] {
      let resp =
        request(&state, method, &format!("/contracts/{id}"), Some(&bob), body).await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} should mask");
    }

    // B's list stays empty.
    let resp = request(&state, "GET", "/contracts", Some(&bob), None).await;
    assert!(json_body(resp).await.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn contract_with_unknown_partner_email_is_404() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      "/contracts",
      Some(&alice),
      Some(json!({
        "title": "T", "content": "C", "partnerEmail": "nobody@x.com"
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn registered_partner_sees_the_contract() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      "/contracts",
      Some(&alice),
      Some(json!({ "title": "Ours", "content": "C", "partnerEmail": "b@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id: Uuid =
      serde_json::from_value(json_body(resp).await["contractId"].clone()).unwrap();

    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&bob), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Partner still cannot update.
    let resp = request(
      &state,
      "PUT",
      &format!("/contracts/{id}"),
      Some(&bob),
      Some(json!({ "title": "X", "content": "Y" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Collaborations ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn collaboration_invite_accept_grants_access() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    // Before anything, B cannot read the contract.
    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&bob), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = request(
      &state,
      "POST",
      "/collaborations/invite",
      Some(&alice),
      Some(json!({ "contractId": id, "invitedEmail": "b@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Duplicate invite.
    let resp = request(
      &state,
      "POST",
      "/collaborations/invite",
      Some(&alice),
      Some(json!({ "contractId": id, "invitedEmail": "b@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // B sees one pending invite and accepts it.
    let resp =
      request(&state, "GET", "/collaborations/invites", Some(&bob), None).await;
    let invites = json_body(resp).await;
    assert_eq!(invites.as_array().unwrap().len(), 1);
    assert_eq!(invites[0]["inviterEmail"], "a@x.com");
    let invite_id = invites[0]["inviteId"].as_str().unwrap().to_string();

    let resp = request(
      &state,
      "POST",
      &format!("/collaborations/accept/{invite_id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Now the contract is visible to B and the collaborator list opens up.
    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&bob), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = request(
      &state,
      "GET",
      &format!("/collaborations/list/{id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let collaborators = json_body(resp).await;
    assert_eq!(collaborators.as_array().unwrap().len(), 1);
    assert_eq!(collaborators[0]["inviteeEmail"], "b@x.com");
  }

  #[tokio::test]
  async fn invite_failure_modes() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    // Missing fields.
    let resp = request(
      &state,
      "POST",
      "/collaborations/invite",
      Some(&alice),
      Some(json!({ "contractId": id })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown invitee.
    let resp = request(
      &state,
      "POST",
      "/collaborations/invite",
      Some(&alice),
      Some(json!({ "contractId": id, "invitedEmail": "ghost@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Non-owner inviting.
    let resp = request(
      &state,
      "POST",
      "/collaborations/invite",
      Some(&bob),
      Some(json!({ "contractId": id, "invitedEmail": "a@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Stranger asking for the collaborator list.
    let resp = request(
      &state,
      "GET",
      &format!("/collaborations/list/{id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Accepting an invite that does not exist.
    let resp = request(
      &state,
      "POST",
      &format!("/collaborations/accept/{}", Uuid::new_v4()),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── External approval ─────────────────────────────────────────────────────

  async fn send_for_approval(
    state: &AppState<SqliteStore>,
    owner_token: &str,
    contract_id: Uuid,
  ) -> String {
    let resp = request(
      state,
      "POST",
      "/external-approval/send",
      Some(owner_token),
      Some(json!({
        "contractId": contract_id,
        "partnerEmail": "partner@external.com"
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await["approvalToken"]
      .as_str()
      .unwrap()
      .to_string()
  }

  #[tokio::test]
  async fn approval_flow_approve_is_terminal() {
    let mailer = RecordingMailer::new();
    let state = make_state_with(mailer.clone()).await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;
    let token = send_for_approval(&state, &alice, id).await;

    // The partner can see the contract through the token alone.
    let resp = request(
      &state,
      "GET",
      &format!("/external-approval/view/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view = json_body(resp).await;
    assert_eq!(view["title"], "Loyalty");
    assert_eq!(view["partnerEmail"], "partner@external.com");

    let resp = request(
      &state,
      "POST",
      &format!("/external-approval/approve/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Terminal: the other transition and a repeat both fail, and the view
    // reports the contract as already approved.
    let resp = request(
      &state,
      "POST",
      &format!("/external-approval/reject/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = request(
      &state,
      "POST",
      &format!("/external-approval/approve/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = request(
      &state,
      "GET",
      &format!("/external-approval/view/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // The owner's copy flipped both fields.
    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&alice), None).await;
    let contract = json_body(resp).await;
    assert_eq!(contract["status"], "accepted");
    assert_eq!(contract["approvalStatus"], "approved");

    // A share link went to the partner, a decision notice to the owner.
    let sent = mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(matches!(&sent[0], OutboundMail::ShareLink { to, .. } if to == "partner@external.com"));
    assert!(
      matches!(&sent[1], OutboundMail::Decision { to, decision, .. }
        if to == "a@x.com" && decision == "approved")
    );
  }

  #[tokio::test]
  async fn approval_flow_reject_leaves_approval_pending() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;
    let token = send_for_approval(&state, &alice, id).await;

    let resp = request(
      &state,
      "POST",
      &format!("/external-approval/reject/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = request(
      &state,
      "POST",
      &format!("/external-approval/approve/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&alice), None).await;
    let contract = json_body(resp).await;
    assert_eq!(contract["status"], "rejected");
    assert_eq!(contract["approvalStatus"], "pending");
  }

  #[tokio::test]
  async fn approval_endpoints_with_unknown_token_are_404() {
    let state = make_state().await;
    for (method, uri) in [
      ("GET", "/external-approval/view/unknown"),
      ("POST", "/external-approval/approve/unknown"),
      ("POST", "/external-approval/reject/unknown"),
    ] {
      let resp = request(&state, method, uri, None, None).await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
  }

  #[tokio::test]
  async fn approval_send_is_owner_only() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = request(
      &state,
      "POST",
      "/external-approval/send",
      Some(&bob),
      Some(json!({ "contractId": id, "partnerEmail": "p@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── External shares ───────────────────────────────────────────────────────

  async fn send_share(
    state: &AppState<SqliteStore>,
    owner_token: &str,
    contract_id: Uuid,
    partner_email: &str,
  ) -> Response {
    request(
      state,
      "POST",
      "/external-share/send",
      Some(owner_token),
      Some(json!({ "contractId": contract_id, "partnerEmail": partner_email })),
    )
    .await
  }

  #[tokio::test]
  async fn share_flow_first_answer_wins() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = send_share(&state, &alice, id, "partner@external.com").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = json_body(resp).await["shareToken"]
      .as_str()
      .unwrap()
      .to_string();

    let resp = request(
      &state,
      "GET",
      &format!("/external-share/view/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view = json_body(resp).await;
    assert_eq!(view["title"], "Loyalty");
    assert_eq!(view["ownerEmail"], "a@x.com");

    let resp = request(
      &state,
      "POST",
      &format!("/external-share/respond/{token}"),
      None,
      Some(json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Second answer loses, whatever it says.
    let resp = request(
      &state,
      "POST",
      &format!("/external-share/respond/{token}"),
      None,
      Some(json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The first decision stuck on the contract.
    let resp =
      request(&state, "GET", &format!("/contracts/{id}"), Some(&alice), None).await;
    assert_eq!(json_body(resp).await["status"], "accepted");
  }

  #[tokio::test]
  async fn share_respond_validates_status() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = send_share(&state, &alice, id, "partner@external.com").await;
    let token = json_body(resp).await["shareToken"]
      .as_str()
      .unwrap()
      .to_string();

    for bad in ["pending", "maybe", ""] {
      let resp = request(
        &state,
        "POST",
        &format!("/external-share/respond/{token}"),
        None,
        Some(json!({ "status": bad })),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{bad:?}");
    }
  }

  #[tokio::test]
  async fn share_view_rejects_forged_tokens() {
    let state = make_state().await;

    let resp =
      request(&state, "GET", "/external-share/view/not.a.jwt", None, None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Signed by somebody else's secret.
    let foreign = TokenService::new("other-secret", 24, 7)
      .issue_share(Uuid::new_v4(), "p@x.com")
      .unwrap();
    let resp = request(
      &state,
      "GET",
      &format!("/external-share/view/{foreign}"),
      None,
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn share_send_failure_leaves_rows_behind() {
    let state = make_state_with(Arc::new(FailingMailer)).await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = send_share(&state, &alice, id, "partner@external.com").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The share row was committed before the email was attempted, so a
    // retry now trips the duplicate guard.
    let resp = send_share(&state, &alice, id, "partner@external.com").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn share_to_registered_email_also_invites() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = send_share(&state, &alice, id, "b@x.com").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp =
      request(&state, "GET", "/collaborations/invites", Some(&bob), None).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn template_catalog_and_instantiation() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;

    // The catalog is not public to the unauthenticated world.
    let resp = request(&state, "GET", "/templates", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    for (title, category) in
      [("Zebra Pact", "misc"), ("Anniversary Calendar", "activities")]
    {
      let resp = request(
        &state,
        "POST",
        "/templates",
        Some(&alice),
        Some(json!({
          "title": title,
          "content": "Article 1: …",
          "category": category,
        })),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = request(&state, "GET", "/templates", Some(&alice), None).await;
    let listed = json_body(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);
    assert_eq!(listed[0]["title"], "Anniversary Calendar");

    let resp = request(
      &state,
      "GET",
      "/templates/category/activities",
      Some(&alice),
      None,
    )
    .await;
    let in_category = json_body(resp).await;
    assert_eq!(in_category.as_array().unwrap().len(), 1);
    let template_id = in_category[0]["templateId"].as_str().unwrap().to_string();

    let resp = request(
      &state,
      "POST",
      &format!("/templates/{template_id}/create-contract"),
      Some(&alice),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = request(&state, "GET", "/contracts", Some(&alice), None).await;
    let contracts = json_body(resp).await;
    assert_eq!(contracts.as_array().unwrap().len(), 1);
    assert_eq!(contracts[0]["title"], "Anniversary Calendar");
    assert_eq!(contracts[0]["status"], "pending");
  }

  #[tokio::test]
  async fn instantiating_a_missing_template_creates_nothing() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      &format!("/templates/{}/create-contract", Uuid::new_v4()),
      Some(&alice),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = request(&state, "GET", "/contracts", Some(&alice), None).await;
    assert!(json_body(resp).await.as_array().unwrap().is_empty());
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn comments_are_deleted_only_by_their_author() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _)   = signup(&state, "b@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = request(
      &state,
      "POST",
      "/comments",
      Some(&alice),
      Some(json!({ "contractId": id, "content": "first draft looks good" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment_id = json_body(resp).await["comment"]["comment"]["commentId"]
      .as_str()
      .unwrap()
      .to_string();

    let resp = request(
      &state,
      "GET",
      &format!("/comments/{id}"),
      Some(&bob),
      None,
    )
    .await;
    let comments = json_body(resp).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);
    assert_eq!(comments[0]["authorEmail"], "a@x.com");

    // Bob cannot delete Alice's comment.
    let resp = request(
      &state,
      "DELETE",
      &format!("/comments/{comment_id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = request(
      &state,
      "DELETE",
      &format!("/comments/{comment_id}"),
      Some(&alice),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn commenting_on_a_missing_contract_is_404() {
    let state = make_state().await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;

    let resp = request(
      &state,
      "POST",
      "/comments",
      Some(&alice),
      Some(json!({ "contractId": Uuid::new_v4(), "content": "hello" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Referrals ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn referral_lifecycle() {
    let state = make_state().await;
    let (alice, alice_id) = signup(&state, "a@x.com", "secret1").await;
    let (bob, _) = signup(&state, "b@x.com", "secret1").await;

    let resp = request(&state, "POST", "/referrals/generate", Some(&alice), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let code = body["referralCode"].as_str().unwrap().to_string();
    assert!(code.starts_with("REF-"));
    assert!(body["referralLink"].as_str().unwrap().contains(&code));

    // Generating again returns the same code.
    let resp = request(&state, "POST", "/referrals/generate", Some(&alice), None).await;
    assert_eq!(json_body(resp).await["referralCode"], json!(code));

    // A friend registers with the code (no auth).
    let resp = request(
      &state,
      "POST",
      "/referrals/register",
      None,
      Some(json!({ "referralCode": code, "email": "friend@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The code is spent.
    let resp = request(
      &state,
      "POST",
      "/referrals/register",
      None,
      Some(json!({ "referralCode": code, "email": "other@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown codes are 404.
    let resp = request(
      &state,
      "POST",
      "/referrals/register",
      None,
      Some(json!({ "referralCode": "REF-nope", "email": "x@x.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Stats are private to their owner.
    let resp = request(
      &state,
      "GET",
      &format!("/referrals/stats/{alice_id}"),
      Some(&bob),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = request(
      &state,
      "GET",
      &format!("/referrals/stats/{alice_id}"),
      Some(&alice),
      None,
    )
    .await;
    let stats = json_body(resp).await;
    assert_eq!(stats["summary"]["registeredCount"], 1);
    assert_eq!(stats["summary"]["paidCount"], 0);

    // Payment completes exactly once.
    let resp = request(
      &state,
      "POST",
      "/referrals/payment-complete",
      Some(&alice),
      Some(json!({ "referralCode": code })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = request(
      &state,
      "POST",
      "/referrals/payment-complete",
      Some(&alice),
      Some(json!({ "referralCode": code })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(
      &state,
      "GET",
      &format!("/referrals/stats/{alice_id}"),
      Some(&alice),
      None,
    )
    .await;
    let stats = json_body(resp).await;
    assert_eq!(stats["summary"]["paidCount"], 1);
    assert_eq!(stats["summary"]["totalRewardCents"], 500);
    assert_eq!(stats["referrals"].as_array().unwrap().len(), 1);
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn notification_dispatch_and_failure_modes() {
    let mailer = RecordingMailer::new();
    let state = make_state_with(mailer.clone()).await;
    let (alice, _) = signup(&state, "a@x.com", "secret1").await;
    let id = make_contract(&state, &alice, "Loyalty").await;

    let resp = request(
      &state,
      "POST",
      "/notifications/send-email",
      Some(&alice),
      Some(json!({ "to": "b@x.com", "type": "invitation", "contractId": id })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(matches!(
      &mailer.sent()[0],
      OutboundMail::Invitation { to, .. } if to == "b@x.com"
    ));

    let resp = request(
      &state,
      "POST",
      "/notifications/send-email",
      Some(&alice),
      Some(json!({ "to": "b@x.com", "type": "carrier-pigeon", "contractId": id })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = request(
      &state,
      "POST",
      "/notifications/send-email",
      Some(&alice),
      Some(json!({
        "to": "b@x.com", "type": "update", "contractId": Uuid::new_v4()
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
