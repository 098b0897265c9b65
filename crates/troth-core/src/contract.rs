//! Contract — the central entity: a text agreement between an owner and a
//! partner.
//!
//! The partner is either a registered user (`partner_id`) or an external
//! party identified only by email (`partner_email`). The two status fields
//! track the agreement's overall state and the partner's approval decision
//! separately.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

// ─── Status enums ────────────────────────────────────────────────────────────

/// Overall state of a contract. `Accepted` and `Rejected` are terminal: no
/// endpoint reverses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
  #[default]
  Pending,
  Accepted,
  Rejected,
}

impl ContractStatus {
  /// The token stored in the database and accepted on the wire.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::Rejected => "rejected",
    }
  }
}

impl FromStr for ContractStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "accepted" => Ok(Self::Accepted),
      "rejected" => Ok(Self::Rejected),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }
}

/// The external partner's approval decision. Becomes `Approved` only
/// together with the contract becoming `Accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
  #[default]
  Pending,
  Approved,
}

impl ApprovalStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
    }
  }
}

impl FromStr for ApprovalStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "approved" => Ok(Self::Approved),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }
}

// ─── Contract ────────────────────────────────────────────────────────────────

/// A text agreement owned by one user.
///
/// `approval_token` is set when the owner sends the contract out for
/// external approval; it is the sole credential for the unauthenticated
/// approve/reject endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
  pub contract_id:     Uuid,
  pub title:           String,
  pub content:         String,
  pub owner_id:        Uuid,
  pub partner_id:      Option<Uuid>,
  pub partner_email:   Option<String>,
  pub status:          ContractStatus,
  pub approval_status: ApprovalStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub approval_token:  Option<String>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

// ─── NewContract ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContractStore::create_contract`].
/// Ids and timestamps are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewContract {
  pub title:      String,
  pub content:    String,
  pub owner_id:   Uuid,
  pub partner_id: Option<Uuid>,
}
