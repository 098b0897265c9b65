//! External shares — partner invitations addressed to an email, not a user.
//!
//! The signed share token embeds the contract id and invitee email; the
//! server re-derives both from the token rather than trusting client-supplied
//! ids. A share is unique per (contract, partner email).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contract::ContractStatus;

/// A pending or answered share. Shares the contract status vocabulary:
/// the invitee's decision is mirrored onto the parent contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalShare {
  pub share_id:      Uuid,
  pub contract_id:   Uuid,
  pub sharer_id:     Uuid,
  pub partner_email: String,
  pub share_token:   String,
  pub status:        ContractStatus,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// What the unauthenticated view endpoint exposes: the contract's public
/// fields plus the owner's email, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareView {
  pub contract_id: Uuid,
  pub title:       String,
  pub content:     String,
  pub owner_email: String,
  pub status:      ContractStatus,
  pub created_at:  DateTime<Utc>,
}
