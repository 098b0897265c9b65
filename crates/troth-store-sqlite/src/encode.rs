//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Status enums are stored as
//! their lowercase tokens. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use troth_core::{
  collab::{CollaboratorView, InviteView},
  comment::{Comment, CommentView},
  contract::Contract,
  referral::Referral,
  share::{ExternalShare, ShareView},
  template::Template,
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Raw strings read directly from a row; each `into_*` parses them into the
// domain type. Status tokens go through the enums' `FromStr` impls.

pub struct RawUser {
  pub user_id:       String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      email:         self.email,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawContract {
  pub contract_id:     String,
  pub title:           String,
  pub content:         String,
  pub owner_id:        String,
  pub partner_id:      Option<String>,
  pub partner_email:   Option<String>,
  pub status:          String,
  pub approval_status: String,
  pub approval_token:  Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawContract {
  /// Column list matching the field order above; keep the two in sync.
  pub const COLUMNS: &'static str = "contract_id, title, content, owner_id, \
     partner_id, partner_email, status, approval_status, approval_token, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id:     row.get(0)?,
      title:           row.get(1)?,
      content:         row.get(2)?,
      owner_id:        row.get(3)?,
      partner_id:      row.get(4)?,
      partner_email:   row.get(5)?,
      status:          row.get(6)?,
      approval_status: row.get(7)?,
      approval_token:  row.get(8)?,
      created_at:      row.get(9)?,
      updated_at:      row.get(10)?,
    })
  }

  pub fn into_contract(self) -> Result<Contract> {
    Ok(Contract {
      contract_id:     decode_uuid(&self.contract_id)?,
      title:           self.title,
      content:         self.content,
      owner_id:        decode_uuid(&self.owner_id)?,
      partner_id:      self.partner_id.as_deref().map(decode_uuid).transpose()?,
      partner_email:   self.partner_email,
      status:          self.status.parse().map_err(Error::Core)?,
      approval_status: self.approval_status.parse().map_err(Error::Core)?,
      approval_token:  self.approval_token,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawTemplate {
  pub template_id: String,
  pub title:       String,
  pub content:     String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub is_public:   bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawTemplate {
  pub const COLUMNS: &'static str = "template_id, title, content, \
     description, category, is_public, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      template_id: row.get(0)?,
      title:       row.get(1)?,
      content:     row.get(2)?,
      description: row.get(3)?,
      category:    row.get(4)?,
      is_public:   row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_template(self) -> Result<Template> {
    Ok(Template {
      template_id: decode_uuid(&self.template_id)?,
      title:       self.title,
      content:     self.content,
      description: self.description,
      category:    self.category,
      is_public:   self.is_public,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawCollaboratorView {
  pub collaboration_id: String,
  pub status:           String,
  pub invitee_email:    String,
  pub owner_email:      String,
  pub created_at:       String,
}

impl RawCollaboratorView {
  pub fn into_view(self) -> Result<CollaboratorView> {
    Ok(CollaboratorView {
      collaboration_id: decode_uuid(&self.collaboration_id)?,
      status:           self.status.parse().map_err(Error::Core)?,
      invitee_email:    self.invitee_email,
      owner_email:      self.owner_email,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawInviteView {
  pub invite_id:      String,
  pub status:         String,
  pub contract_id:    String,
  pub contract_title: String,
  pub inviter_email:  String,
  pub created_at:     String,
}

impl RawInviteView {
  pub fn into_view(self) -> Result<InviteView> {
    Ok(InviteView {
      invite_id:      decode_uuid(&self.invite_id)?,
      status:         self.status.parse().map_err(Error::Core)?,
      contract_id:    decode_uuid(&self.contract_id)?,
      contract_title: self.contract_title,
      inviter_email:  self.inviter_email,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawCommentView {
  pub comment_id:   String,
  pub contract_id:  String,
  pub author_id:    String,
  pub content:      String,
  pub created_at:   String,
  pub author_email: String,
}

impl RawCommentView {
  pub fn into_view(self) -> Result<CommentView> {
    Ok(CommentView {
      comment:      Comment {
        comment_id:  decode_uuid(&self.comment_id)?,
        contract_id: decode_uuid(&self.contract_id)?,
        author_id:   decode_uuid(&self.author_id)?,
        content:     self.content,
        created_at:  decode_dt(&self.created_at)?,
      },
      author_email: self.author_email,
    })
  }
}

pub struct RawShare {
  pub share_id:      String,
  pub contract_id:   String,
  pub sharer_id:     String,
  pub partner_email: String,
  pub share_token:   String,
  pub status:        String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawShare {
  pub const COLUMNS: &'static str = "share_id, contract_id, sharer_id, \
     partner_email, share_token, status, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      share_id:      row.get(0)?,
      contract_id:   row.get(1)?,
      sharer_id:     row.get(2)?,
      partner_email: row.get(3)?,
      share_token:   row.get(4)?,
      status:        row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_share(self) -> Result<ExternalShare> {
    Ok(ExternalShare {
      share_id:      decode_uuid(&self.share_id)?,
      contract_id:   decode_uuid(&self.contract_id)?,
      sharer_id:     decode_uuid(&self.sharer_id)?,
      partner_email: self.partner_email,
      share_token:   self.share_token,
      status:        self.status.parse().map_err(Error::Core)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawShareView {
  pub contract_id: String,
  pub title:       String,
  pub content:     String,
  pub owner_email: String,
  pub status:      String,
  pub created_at:  String,
}

impl RawShareView {
  pub fn into_view(self) -> Result<ShareView> {
    Ok(ShareView {
      contract_id: decode_uuid(&self.contract_id)?,
      title:       self.title,
      content:     self.content,
      owner_email: self.owner_email,
      status:      self.status.parse().map_err(Error::Core)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawReferral {
  pub referral_id:    String,
  pub referrer_id:    String,
  pub referred_email: Option<String>,
  pub code:           String,
  pub status:         String,
  pub reward_cents:   i64,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawReferral {
  pub const COLUMNS: &'static str = "referral_id, referrer_id, \
     referred_email, code, status, reward_cents, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      referral_id:    row.get(0)?,
      referrer_id:    row.get(1)?,
      referred_email: row.get(2)?,
      code:           row.get(3)?,
      status:         row.get(4)?,
      reward_cents:   row.get(5)?,
      created_at:     row.get(6)?,
      updated_at:     row.get(7)?,
    })
  }

  pub fn into_referral(self) -> Result<Referral> {
    Ok(Referral {
      referral_id:    decode_uuid(&self.referral_id)?,
      referrer_id:    decode_uuid(&self.referrer_id)?,
      referred_email: self.referred_email,
      code:           self.code,
      status:         self.status.parse().map_err(Error::Core)?,
      reward_cents:   self.reward_cents,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}
