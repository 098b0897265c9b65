//! Referral bookkeeping.
//!
//! Each referrer holds one active code. Status moves strictly
//! pending → registered → paid; the store enforces the monotonic
//! transitions with conditional updates, so a regression is impossible
//! even under concurrent requests.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
  #[default]
  Pending,
  Registered,
  Paid,
}

impl ReferralStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Registered => "registered",
      Self::Paid => "paid",
    }
  }
}

impl FromStr for ReferralStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "registered" => Ok(Self::Registered),
      "paid" => Ok(Self::Paid),
      other => Err(Error::UnknownStatus(other.to_string())),
    }
  }
}

/// One referral row. `referred_email` is empty until somebody registers
/// with the code. Reward amounts are integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
  pub referral_id:    Uuid,
  pub referrer_id:    Uuid,
  pub referred_email: Option<String>,
  pub code:           String,
  pub status:         ReferralStatus,
  pub reward_cents:   i64,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Aggregate counters for a referrer's dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
  pub registered_count:   u64,
  pub paid_count:         u64,
  pub total_reward_cents: i64,
  pub code:               Option<String>,
}
