//! Collaboration invites between registered users.
//!
//! An invite grants the invitee read/comment access to a contract, but only
//! once accepted. Pending invites confer nothing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// State of an invite. There is no reject path; unwanted invites simply
/// stay pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
  #[default]
  Pending,
  Accepted,
}

impl InviteStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
    }
  }
}

impl FromStr for InviteStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "accepted" => Ok(Self::Accepted),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }
}

/// An invitation from a contract's owner to another registered user.
/// Unique per (contract, inviter, invitee).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaboration {
  pub collaboration_id: Uuid,
  pub contract_id:      Uuid,
  pub inviter_id:       Uuid,
  pub invitee_id:       Uuid,
  pub status:           InviteStatus,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

// ─── Read views ──────────────────────────────────────────────────────────────

/// A collaborator row joined with the emails a client needs to render it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorView {
  pub collaboration_id: Uuid,
  pub status:           InviteStatus,
  pub invitee_email:    String,
  pub owner_email:      String,
  pub created_at:       DateTime<Utc>,
}

/// A pending invite as shown in the invitee's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteView {
  pub invite_id:      Uuid,
  pub status:         InviteStatus,
  pub contract_id:    Uuid,
  pub contract_title: String,
  pub inviter_email:  String,
  pub created_at:     DateTime<Utc>,
}
