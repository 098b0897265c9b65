//! Pre-written contract templates.
//!
//! Templates are read-only to end users; mutation happens through the
//! admin-style endpoints. Only public templates are visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
  pub template_id: Uuid,
  pub title:       String,
  pub content:     String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub is_public:   bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to template create and update. Ids and timestamps are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewTemplate {
  pub title:       String,
  pub content:     String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub is_public:   bool,
}
