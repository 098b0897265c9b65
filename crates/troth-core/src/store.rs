//! The `ContractStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `troth-store-sqlite`).
//! Higher layers (`troth-api`) depend on this abstraction, not on any
//! concrete backend.
//!
//! Authorization scoping is part of the contract: operations that take both
//! a row id and a user id (`update_contract`, `delete_comment`,
//! `accept_invite`, ...) match on both in one statement, so a caller who is
//! not the owner/addressee observes plain absence. State transitions
//! (`approve_contract`, `respond_share`, referral moves) are conditional
//! single-statement updates — `None`/`false` means the guard failed, and two
//! racing callers can never both win.

use std::future::Future;

use uuid::Uuid;

use crate::{
  collab::{Collaboration, CollaboratorView, InviteView},
  comment::CommentView,
  contract::{Contract, ContractStatus, NewContract},
  referral::{Referral, ReferralStats},
  share::{ExternalShare, ShareView},
  template::{NewTemplate, Template},
  user::User,
};

/// Abstraction over a Troth storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ContractStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. `None` if the email is already registered — the
  /// unique constraint decides, so two racing registrations cannot both win.
  fn create_user(
    &self,
    email: String,
    password_hash: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  fn user_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Contracts ─────────────────────────────────────────────────────────

  fn create_contract(
    &self,
    input: NewContract,
  ) -> impl Future<Output = Result<Contract, Self::Error>> + Send + '_;

  /// Every contract where `user_id` is the owner or the registered partner.
  fn contracts_for_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + '_;

  /// A contract as visible to `user_id`: the owner, the registered partner,
  /// or a collaborator whose invite has been accepted. Anyone else observes
  /// `None` — absence and denial are identical.
  fn contract_visible_to(
    &self,
    contract_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  /// Unscoped lookup for internal checks (comment creation, mail context).
  fn contract_by_id(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  /// Owner-scoped update of title and content. `false` if the contract does
  /// not exist or `owner_id` does not own it.
  fn update_contract(
    &self,
    contract_id: Uuid,
    owner_id: Uuid,
    title: String,
    content: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Owner-scoped delete; cascades to comments, collaborations, and shares.
  fn delete_contract(
    &self,
    contract_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Unconditional status write — used to mirror an external-share decision
  /// onto the parent contract.
  fn set_contract_status(
    &self,
    contract_id: Uuid,
    status: ContractStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── External approval ─────────────────────────────────────────────────

  /// Attach an approval token and partner email to an owned contract.
  /// `false` if `owner_id` does not own the contract.
  fn set_approval_token(
    &self,
    contract_id: Uuid,
    owner_id: Uuid,
    partner_email: String,
    token: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn contract_by_approval_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + 'a;

  /// Approve by token: one conditional update gated on
  /// `approval_status = 'pending'` that sets `approval_status = approved`
  /// and `status = accepted` together. Returns the contract after the
  /// transition, or `None` if the guard failed (unknown token or already
  /// decided).
  fn approve_contract<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + 'a;

  /// Reject by token under the same guard; sets `status = rejected` and
  /// leaves `approval_status` untouched.
  fn reject_contract<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + 'a;

  // ── Collaborations ────────────────────────────────────────────────────

  /// Persist an invite. `None` if the (contract, inviter, invitee) triple
  /// already exists — under concurrent duplicate invites the second writer
  /// loses at the unique constraint.
  fn create_invite(
    &self,
    contract_id: Uuid,
    inviter_id: Uuid,
    invitee_id: Uuid,
  ) -> impl Future<Output = Result<Option<Collaboration>, Self::Error>> + Send + '_;

  /// Whether any invite for (contract, invitee) exists, in any state.
  fn invite_exists(
    &self,
    contract_id: Uuid,
    invitee_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn collaborators_for_contract(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CollaboratorView>, Self::Error>> + Send + '_;

  /// Accept a pending invite addressed to `invitee_id`. `false` if no such
  /// pending invite exists — wrong callee and already-accepted look the same.
  fn accept_invite(
    &self,
    invite_id: Uuid,
    invitee_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Pending invites addressed to the caller, most recent first.
  fn pending_invites_for(
    &self,
    invitee_id: Uuid,
  ) -> impl Future<Output = Result<Vec<InviteView>, Self::Error>> + Send + '_;

  /// The access predicate behind collaborator-only endpoints: true when
  /// `user_id` owns the contract or holds an accepted invite for it.
  /// Evaluated per request, never cached.
  fn has_contract_access(
    &self,
    contract_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  fn create_comment(
    &self,
    contract_id: Uuid,
    author_id: Uuid,
    content: String,
  ) -> impl Future<Output = Result<CommentView, Self::Error>> + Send + '_;

  /// Comments on a contract, newest first, joined with author emails.
  fn comments_for_contract(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CommentView>, Self::Error>> + Send + '_;

  /// Author-scoped delete. `false` if absent or not the author.
  fn delete_comment(
    &self,
    comment_id: Uuid,
    author_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── External shares ───────────────────────────────────────────────────

  /// Persist a share row. `None` if the (contract, partner email) pair
  /// already exists.
  fn create_share(
    &self,
    contract_id: Uuid,
    sharer_id: Uuid,
    partner_email: String,
    token: String,
  ) -> impl Future<Output = Result<Option<ExternalShare>, Self::Error>> + Send + '_;

  /// The share joined with its contract's public fields, matched on both
  /// the token and the email the token claims to be for.
  fn share_view<'a>(
    &'a self,
    token: &'a str,
    partner_email: &'a str,
  ) -> impl Future<Output = Result<Option<ShareView>, Self::Error>> + Send + 'a;

  /// Record the invitee's decision: one conditional update gated on
  /// `status = 'pending'`. Returns the updated share, or `None` if the
  /// guard failed (unknown token or already responded). The caller mirrors
  /// the decision onto the contract afterwards.
  fn respond_share<'a>(
    &'a self,
    token: &'a str,
    partner_email: &'a str,
    decision: ContractStatus,
  ) -> impl Future<Output = Result<Option<ExternalShare>, Self::Error>> + Send + 'a;

  // ── Templates ─────────────────────────────────────────────────────────

  fn create_template(
    &self,
    input: NewTemplate,
  ) -> impl Future<Output = Result<Template, Self::Error>> + Send + '_;

  /// Public templates, alphabetical by title.
  fn list_templates(
    &self,
  ) -> impl Future<Output = Result<Vec<Template>, Self::Error>> + Send + '_;

  fn templates_by_category<'a>(
    &'a self,
    category: &'a str,
  ) -> impl Future<Output = Result<Vec<Template>, Self::Error>> + Send + 'a;

  /// A public template by id. Non-public templates are invisible here.
  fn template_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Template>, Self::Error>> + Send + '_;

  fn update_template(
    &self,
    id: Uuid,
    input: NewTemplate,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_template(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Copy a public template into a new pending contract owned by
  /// `owner_id`, inside one transaction: a missing template rolls the whole
  /// operation back and returns `None` — no orphan contract is ever created.
  fn instantiate_template(
    &self,
    template_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  // ── Referrals ─────────────────────────────────────────────────────────

  /// The caller's code-bearing referral row, if one exists.
  fn referral_for(
    &self,
    referrer_id: Uuid,
  ) -> impl Future<Output = Result<Option<Referral>, Self::Error>> + Send + '_;

  fn create_referral(
    &self,
    referrer_id: Uuid,
    code: String,
  ) -> impl Future<Output = Result<Referral, Self::Error>> + Send + '_;

  /// pending → registered, recording the registrant's email. Conditional on
  /// the current status; a registered or paid referral is left untouched.
  fn register_referral<'a>(
    &'a self,
    code: &'a str,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn referral_by_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Referral>, Self::Error>> + Send + 'a;

  /// registered → paid with the reward recorded. Conditional on the current
  /// status; never regresses and never double-pays.
  fn complete_referral<'a>(
    &'a self,
    code: &'a str,
    reward_cents: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn referral_stats(
    &self,
    referrer_id: Uuid,
  ) -> impl Future<Output = Result<ReferralStats, Self::Error>> + Send + '_;

  /// Detailed referral rows for a referrer, newest first, excluding the
  /// bare code-holder row (no registered email yet).
  fn referrals_for(
    &self,
    referrer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Referral>, Self::Error>> + Send + '_;
}
