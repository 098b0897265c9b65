//! Comments on contracts. Deleted only by their author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub comment_id:  Uuid,
  pub contract_id: Uuid,
  pub author_id:   Uuid,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
}

/// A comment joined with its author's email for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
  pub comment:      Comment,
  pub author_email: String,
}
