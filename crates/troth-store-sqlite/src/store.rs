//! [`SqliteStore`] — the SQLite implementation of [`ContractStore`].
//!
//! Every state transition that must not double-apply (approve, reject,
//! respond, accept, referral moves) is a single conditional `UPDATE` whose
//! affected-row count decides the outcome; no read-then-write pairs.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use troth_core::{
  collab::{Collaboration, CollaboratorView, InviteView},
  comment::{Comment, CommentView},
  contract::{Contract, ContractStatus, NewContract},
  referral::{Referral, ReferralStats, ReferralStatus},
  share::{ExternalShare, ShareView},
  store::ContractStore,
  template::{NewTemplate, Template},
  user::User,
};

use crate::{
  Error, Result,
  encode::{
    RawCollaboratorView, RawCommentView, RawContract, RawInviteView,
    RawReferral, RawShare, RawShareView, RawTemplate, RawUser, encode_dt,
    encode_uuid,
  },
  error::is_constraint_violation,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Troth store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a fully-built [`Contract`] row.
  async fn insert_contract(&self, contract: &Contract) -> Result<()> {
    let id_str      = encode_uuid(contract.contract_id);
    let title       = contract.title.clone();
    let content     = contract.content.clone();
    let owner_str   = encode_uuid(contract.owner_id);
    let partner_str = contract.partner_id.map(encode_uuid);
    let email       = contract.partner_email.clone();
    let status      = contract.status.as_str();
    let approval    = contract.approval_status.as_str();
    let token       = contract.approval_token.clone();
    let created_str = encode_dt(contract.created_at);
    let updated_str = encode_dt(contract.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contracts (
             contract_id, title, content, owner_id, partner_id, partner_email,
             status, approval_status, approval_token, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            title,
            content,
            owner_str,
            partner_str,
            email,
            status,
            approval,
            token,
            created_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ContractStore impl ──────────────────────────────────────────────────────

impl ContractStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(
    &self,
    email: String,
    password_hash: String,
  ) -> Result<Option<User>> {
    let user = User {
      user_id: Uuid::new_v4(),
      email,
      password_hash,
      created_at: Utc::now(),
    };

    let id_str    = encode_uuid(user.user_id);
    let email_str = user.email.clone();
    let hash_str  = user.password_hash.clone();
    let at_str    = encode_dt(user.created_at);

    let result = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, email_str, hash_str, at_str],
        )?;
        Ok(())
      })
      .await;

    match result {
      Ok(()) => Ok(Some(user)),
      Err(e) if is_constraint_violation(&e) => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
    let email_str = email.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, email, password_hash, created_at
             FROM users WHERE email = ?1",
            rusqlite::params![email_str],
            |row| {
              Ok(RawUser {
                user_id:       row.get(0)?,
                email:         row.get(1)?,
                password_hash: row.get(2)?,
                created_at:    row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, email, password_hash, created_at
             FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawUser {
                user_id:       row.get(0)?,
                email:         row.get(1)?,
                password_hash: row.get(2)?,
                created_at:    row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Contracts ─────────────────────────────────────────────────────────────

  async fn create_contract(&self, input: NewContract) -> Result<Contract> {
    let now = Utc::now();
    let contract = Contract {
      contract_id:     Uuid::new_v4(),
      title:           input.title,
      content:         input.content,
      owner_id:        input.owner_id,
      partner_id:      input.partner_id,
      partner_email:   None,
      status:          Default::default(),
      approval_status: Default::default(),
      approval_token:  None,
      created_at:      now,
      updated_at:      now,
    };

    self.insert_contract(&contract).await?;
    Ok(contract)
  }

  async fn contracts_for_user(&self, user_id: Uuid) -> Result<Vec<Contract>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawContract> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM contracts
           WHERE owner_id = ?1 OR partner_id = ?1
           ORDER BY created_at DESC",
          RawContract::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawContract::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_contract).collect()
  }

  async fn contract_visible_to(
    &self,
    contract_id: Uuid,
    user_id: Uuid,
  ) -> Result<Option<Contract>> {
    let contract_str = encode_uuid(contract_id);
    let user_str     = encode_uuid(user_id);

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM contracts
               WHERE contract_id = ?1
                 AND (owner_id = ?2 OR partner_id = ?2
                      OR EXISTS (SELECT 1 FROM collaborations
                                 WHERE contract_id = ?1
                                   AND invitee_id = ?2
                                   AND status = 'accepted'))",
              RawContract::COLUMNS
            ),
            rusqlite::params![contract_str, user_str],
            RawContract::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn contract_by_id(&self, contract_id: Uuid) -> Result<Option<Contract>> {
    let id_str = encode_uuid(contract_id);

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM contracts WHERE contract_id = ?1",
              RawContract::COLUMNS
            ),
            rusqlite::params![id_str],
            RawContract::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn update_contract(
    &self,
    contract_id: Uuid,
    owner_id: Uuid,
    title: String,
    content: String,
  ) -> Result<bool> {
    let contract_str = encode_uuid(contract_id);
    let owner_str    = encode_uuid(owner_id);
    let now_str      = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contracts SET title = ?3, content = ?4, updated_at = ?5
           WHERE contract_id = ?1 AND owner_id = ?2",
          rusqlite::params![contract_str, owner_str, title, content, now_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn delete_contract(&self, contract_id: Uuid, owner_id: Uuid) -> Result<bool> {
    let contract_str = encode_uuid(contract_id);
    let owner_str    = encode_uuid(owner_id);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contracts WHERE contract_id = ?1 AND owner_id = ?2",
          rusqlite::params![contract_str, owner_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn set_contract_status(
    &self,
    contract_id: Uuid,
    status: ContractStatus,
  ) -> Result<()> {
    let contract_str = encode_uuid(contract_id);
    let status_str   = status.as_str();
    let now_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE contracts SET status = ?2, updated_at = ?3
           WHERE contract_id = ?1",
          rusqlite::params![contract_str, status_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── External approval ─────────────────────────────────────────────────────

  async fn set_approval_token(
    &self,
    contract_id: Uuid,
    owner_id: Uuid,
    partner_email: String,
    token: String,
  ) -> Result<bool> {
    let contract_str = encode_uuid(contract_id);
    let owner_str    = encode_uuid(owner_id);
    let now_str      = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contracts
             SET approval_token = ?3, partner_email = ?4, updated_at = ?5
           WHERE contract_id = ?1 AND owner_id = ?2",
          rusqlite::params![contract_str, owner_str, token, partner_email, now_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn contract_by_approval_token(&self, token: &str) -> Result<Option<Contract>> {
    let token_str = token.to_owned();

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM contracts WHERE approval_token = ?1",
              RawContract::COLUMNS
            ),
            rusqlite::params![token_str],
            RawContract::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn approve_contract(&self, token: &str) -> Result<Option<Contract>> {
    let token_str = token.to_owned();
    let now_str   = encode_dt(Utc::now());

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        // Both status fields are gated so approve and reject are mutually
        // exclusive even when fired concurrently: the first conditional
        // update to land wins, the other matches zero rows.
        let affected = conn.execute(
          "UPDATE contracts
             SET approval_status = 'approved', status = 'accepted', updated_at = ?2
           WHERE approval_token = ?1
             AND approval_status = 'pending' AND status = 'pending'",
          rusqlite::params![token_str, now_str],
        )?;
        if affected == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM contracts WHERE approval_token = ?1",
                RawContract::COLUMNS
              ),
              rusqlite::params![token_str],
              RawContract::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn reject_contract(&self, token: &str) -> Result<Option<Contract>> {
    let token_str = token.to_owned();
    let now_str   = encode_dt(Utc::now());

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        let affected = conn.execute(
          "UPDATE contracts
             SET status = 'rejected', updated_at = ?2
           WHERE approval_token = ?1
             AND approval_status = 'pending' AND status = 'pending'",
          rusqlite::params![token_str, now_str],
        )?;
        if affected == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM contracts WHERE approval_token = ?1",
                RawContract::COLUMNS
              ),
              rusqlite::params![token_str],
              RawContract::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  // ── Collaborations ────────────────────────────────────────────────────────

  async fn create_invite(
    &self,
    contract_id: Uuid,
    inviter_id: Uuid,
    invitee_id: Uuid,
  ) -> Result<Option<Collaboration>> {
    let now = Utc::now();
    let collab = Collaboration {
      collaboration_id: Uuid::new_v4(),
      contract_id,
      inviter_id,
      invitee_id,
      status: Default::default(),
      created_at: now,
      updated_at: now,
    };

    let id_str       = encode_uuid(collab.collaboration_id);
    let contract_str = encode_uuid(contract_id);
    let inviter_str  = encode_uuid(inviter_id);
    let invitee_str  = encode_uuid(invitee_id);
    let status_str   = collab.status.as_str();
    let at_str       = encode_dt(now);

    let result = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO collaborations (
             collaboration_id, contract_id, inviter_id, invitee_id,
             status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![
            id_str,
            contract_str,
            inviter_str,
            invitee_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await;

    match result {
      Ok(()) => Ok(Some(collab)),
      Err(e) if is_constraint_violation(&e) => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn invite_exists(&self, contract_id: Uuid, invitee_id: Uuid) -> Result<bool> {
    let contract_str = encode_uuid(contract_id);
    let invitee_str  = encode_uuid(invitee_id);

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM collaborations
               WHERE contract_id = ?1 AND invitee_id = ?2",
              rusqlite::params![contract_str, invitee_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(exists)
  }

  async fn collaborators_for_contract(
    &self,
    contract_id: Uuid,
  ) -> Result<Vec<CollaboratorView>> {
    let contract_str = encode_uuid(contract_id);

    let raws: Vec<RawCollaboratorView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.collaboration_id, c.status, u.email, owner.email, c.created_at
           FROM collaborations c
           JOIN users u        ON u.user_id = c.invitee_id
           JOIN contracts cont ON cont.contract_id = c.contract_id
           JOIN users owner    ON owner.user_id = cont.owner_id
           WHERE c.contract_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![contract_str], |row| {
            Ok(RawCollaboratorView {
              collaboration_id: row.get(0)?,
              status:           row.get(1)?,
              invitee_email:    row.get(2)?,
              owner_email:      row.get(3)?,
              created_at:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCollaboratorView::into_view).collect()
  }

  async fn accept_invite(&self, invite_id: Uuid, invitee_id: Uuid) -> Result<bool> {
    let invite_str  = encode_uuid(invite_id);
    let invitee_str = encode_uuid(invitee_id);
    let now_str     = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE collaborations SET status = 'accepted', updated_at = ?3
           WHERE collaboration_id = ?1 AND invitee_id = ?2
             AND status = 'pending'",
          rusqlite::params![invite_str, invitee_str, now_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn pending_invites_for(&self, invitee_id: Uuid) -> Result<Vec<InviteView>> {
    let invitee_str = encode_uuid(invitee_id);

    let raws: Vec<RawInviteView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.collaboration_id, c.status, cont.contract_id,
                  cont.title, u.email, c.created_at
           FROM collaborations c
           JOIN contracts cont ON cont.contract_id = c.contract_id
           JOIN users u        ON u.user_id = c.inviter_id
           WHERE c.invitee_id = ?1 AND c.status = 'pending'
           ORDER BY c.created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![invitee_str], |row| {
            Ok(RawInviteView {
              invite_id:      row.get(0)?,
              status:         row.get(1)?,
              contract_id:    row.get(2)?,
              contract_title: row.get(3)?,
              inviter_email:  row.get(4)?,
              created_at:     row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawInviteView::into_view).collect()
  }

  async fn has_contract_access(&self, contract_id: Uuid, user_id: Uuid) -> Result<bool> {
    let contract_str = encode_uuid(contract_id);
    let user_str     = encode_uuid(user_id);

    let access: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM contracts
               WHERE contract_id = ?1 AND owner_id = ?2
               UNION
               SELECT 1 FROM collaborations
               WHERE contract_id = ?1 AND invitee_id = ?2
                 AND status = 'accepted'
               LIMIT 1",
              rusqlite::params![contract_str, user_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(access)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn create_comment(
    &self,
    contract_id: Uuid,
    author_id: Uuid,
    content: String,
  ) -> Result<CommentView> {
    let comment = Comment {
      comment_id: Uuid::new_v4(),
      contract_id,
      author_id,
      content,
      created_at: Utc::now(),
    };

    let id_str       = encode_uuid(comment.comment_id);
    let contract_str = encode_uuid(contract_id);
    let author_str   = encode_uuid(author_id);
    let content_str  = comment.content.clone();
    let at_str       = encode_dt(comment.created_at);

    let author_email: String = self
      .conn
      .call(move |conn| {
        let email: String = conn.query_row(
          "SELECT email FROM users WHERE user_id = ?1",
          rusqlite::params![author_str],
          |row| row.get(0),
        )?;
        conn.execute(
          "INSERT INTO comments (comment_id, contract_id, author_id, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, contract_str, author_str, content_str, at_str],
        )?;
        Ok(email)
      })
      .await?;

    Ok(CommentView { comment, author_email })
  }

  async fn comments_for_contract(&self, contract_id: Uuid) -> Result<Vec<CommentView>> {
    let contract_str = encode_uuid(contract_id);

    let raws: Vec<RawCommentView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.comment_id, c.contract_id, c.author_id, c.content,
                  c.created_at, u.email
           FROM comments c
           JOIN users u ON u.user_id = c.author_id
           WHERE c.contract_id = ?1
           ORDER BY c.created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![contract_str], |row| {
            Ok(RawCommentView {
              comment_id:   row.get(0)?,
              contract_id:  row.get(1)?,
              author_id:    row.get(2)?,
              content:      row.get(3)?,
              created_at:   row.get(4)?,
              author_email: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCommentView::into_view).collect()
  }

  async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> Result<bool> {
    let comment_str = encode_uuid(comment_id);
    let author_str  = encode_uuid(author_id);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM comments WHERE comment_id = ?1 AND author_id = ?2",
          rusqlite::params![comment_str, author_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  // ── External shares ───────────────────────────────────────────────────────

  async fn create_share(
    &self,
    contract_id: Uuid,
    sharer_id: Uuid,
    partner_email: String,
    token: String,
  ) -> Result<Option<ExternalShare>> {
    let now = Utc::now();
    let share = ExternalShare {
      share_id: Uuid::new_v4(),
      contract_id,
      sharer_id,
      partner_email,
      share_token: token,
      status: Default::default(),
      created_at: now,
      updated_at: now,
    };

    let id_str       = encode_uuid(share.share_id);
    let contract_str = encode_uuid(contract_id);
    let sharer_str   = encode_uuid(sharer_id);
    let email_str    = share.partner_email.clone();
    let token_str    = share.share_token.clone();
    let status_str   = share.status.as_str();
    let at_str       = encode_dt(now);

    let result = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO external_shares (
             share_id, contract_id, sharer_id, partner_email, share_token,
             status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            id_str,
            contract_str,
            sharer_str,
            email_str,
            token_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await;

    match result {
      Ok(()) => Ok(Some(share)),
      Err(e) if is_constraint_violation(&e) => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn share_view(&self, token: &str, partner_email: &str) -> Result<Option<ShareView>> {
    let token_str = token.to_owned();
    let email_str = partner_email.to_owned();

    let raw: Option<RawShareView> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT es.contract_id, c.title, c.content, u.email,
                      es.status, es.created_at
               FROM external_shares es
               JOIN contracts c ON c.contract_id = es.contract_id
               JOIN users u     ON u.user_id = es.sharer_id
               WHERE es.share_token = ?1 AND es.partner_email = ?2",
              rusqlite::params![token_str, email_str],
              |row| {
                Ok(RawShareView {
                  contract_id: row.get(0)?,
                  title:       row.get(1)?,
                  content:     row.get(2)?,
                  owner_email: row.get(3)?,
                  status:      row.get(4)?,
                  created_at:  row.get(5)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawShareView::into_view).transpose()
  }

  async fn respond_share(
    &self,
    token: &str,
    partner_email: &str,
    decision: ContractStatus,
  ) -> Result<Option<ExternalShare>> {
    let token_str    = token.to_owned();
    let email_str    = partner_email.to_owned();
    let decision_str = decision.as_str();
    let now_str      = encode_dt(Utc::now());

    let raw: Option<RawShare> = self
      .conn
      .call(move |conn| {
        // The `status = 'pending'` guard is the sole defence against two
        // simultaneous responses: zero affected rows means somebody else
        // already answered (or the token matches nothing).
        let affected = conn.execute(
          "UPDATE external_shares SET status = ?3, updated_at = ?4
           WHERE share_token = ?1 AND partner_email = ?2
             AND status = 'pending'",
          rusqlite::params![token_str, email_str, decision_str, now_str],
        )?;
        if affected == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM external_shares
                 WHERE share_token = ?1 AND partner_email = ?2",
                RawShare::COLUMNS
              ),
              rusqlite::params![token_str, email_str],
              RawShare::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawShare::into_share).transpose()
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  async fn create_template(&self, input: NewTemplate) -> Result<Template> {
    let now = Utc::now();
    let template = Template {
      template_id: Uuid::new_v4(),
      title:       input.title,
      content:     input.content,
      description: input.description,
      category:    input.category,
      is_public:   input.is_public,
      created_at:  now,
      updated_at:  now,
    };

    let id_str      = encode_uuid(template.template_id);
    let title       = template.title.clone();
    let content     = template.content.clone();
    let description = template.description.clone();
    let category    = template.category.clone();
    let is_public   = template.is_public;
    let at_str      = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO templates (
             template_id, title, content, description, category, is_public,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            id_str,
            title,
            content,
            description,
            category,
            is_public,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(template)
  }

  async fn list_templates(&self) -> Result<Vec<Template>> {
    let raws: Vec<RawTemplate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM templates WHERE is_public = 1 ORDER BY title ASC",
          RawTemplate::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawTemplate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTemplate::into_template).collect()
  }

  async fn templates_by_category(&self, category: &str) -> Result<Vec<Template>> {
    let category_str = category.to_owned();

    let raws: Vec<RawTemplate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM templates
           WHERE category = ?1 AND is_public = 1
           ORDER BY title ASC",
          RawTemplate::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![category_str], RawTemplate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTemplate::into_template).collect()
  }

  async fn template_by_id(&self, id: Uuid) -> Result<Option<Template>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTemplate> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM templates
                 WHERE template_id = ?1 AND is_public = 1",
                RawTemplate::COLUMNS
              ),
              rusqlite::params![id_str],
              RawTemplate::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTemplate::into_template).transpose()
  }

  async fn update_template(&self, id: Uuid, input: NewTemplate) -> Result<bool> {
    let id_str      = encode_uuid(id);
    let now_str     = encode_dt(Utc::now());
    let title       = input.title;
    let content     = input.content;
    let description = input.description;
    let category    = input.category;
    let is_public   = input.is_public;

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE templates
             SET title = ?2, content = ?3, description = ?4, category = ?5,
                 is_public = ?6, updated_at = ?7
           WHERE template_id = ?1",
          rusqlite::params![
            id_str,
            title,
            content,
            description,
            category,
            is_public,
            now_str,
          ],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn delete_template(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM templates WHERE template_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn instantiate_template(
    &self,
    template_id: Uuid,
    owner_id: Uuid,
  ) -> Result<Option<Contract>> {
    let template_str = encode_uuid(template_id);
    let contract_id  = Uuid::new_v4();
    let contract_str = encode_uuid(contract_id);
    let owner_str    = encode_uuid(owner_id);
    let now          = Utc::now();
    let now_str      = encode_dt(now);

    // Template lookup and contract insert share one transaction: if the
    // template is missing the transaction never commits, so no orphan
    // contract can be observed even mid-operation.
    let copied: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let template: Option<(String, String)> = tx
          .query_row(
            "SELECT title, content FROM templates
             WHERE template_id = ?1 AND is_public = 1",
            rusqlite::params![template_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let Some((title, content)) = template else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO contracts (
             contract_id, title, content, owner_id, partner_id, partner_email,
             status, approval_status, approval_token, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, NULL, NULL,
                     'pending', 'pending', NULL, ?5, ?5)",
          rusqlite::params![contract_str, title, content, owner_str, now_str],
        )?;
        tx.commit()?;

        Ok(Some((title, content)))
      })
      .await?;

    Ok(copied.map(|(title, content)| Contract {
      contract_id,
      title,
      content,
      owner_id,
      partner_id: None,
      partner_email: None,
      status: Default::default(),
      approval_status: Default::default(),
      approval_token: None,
      created_at: now,
      updated_at: now,
    }))
  }

  // ── Referrals ─────────────────────────────────────────────────────────────

  async fn referral_for(&self, referrer_id: Uuid) -> Result<Option<Referral>> {
    let referrer_str = encode_uuid(referrer_id);

    let raw: Option<RawReferral> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM referrals
                 WHERE referrer_id = ?1
                 ORDER BY created_at ASC LIMIT 1",
                RawReferral::COLUMNS
              ),
              rusqlite::params![referrer_str],
              RawReferral::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReferral::into_referral).transpose()
  }

  async fn create_referral(&self, referrer_id: Uuid, code: String) -> Result<Referral> {
    let now = Utc::now();
    let referral = Referral {
      referral_id:    Uuid::new_v4(),
      referrer_id,
      referred_email: None,
      code,
      status:         ReferralStatus::Pending,
      reward_cents:   0,
      created_at:     now,
      updated_at:     now,
    };

    let id_str       = encode_uuid(referral.referral_id);
    let referrer_str = encode_uuid(referrer_id);
    let code_str     = referral.code.clone();
    let status_str   = referral.status.as_str();
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO referrals (
             referral_id, referrer_id, referred_email, code, status,
             reward_cents, created_at, updated_at
           ) VALUES (?1, ?2, NULL, ?3, ?4, 0, ?5, ?5)",
          rusqlite::params![id_str, referrer_str, code_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(referral)
  }

  async fn register_referral(&self, code: &str, email: String) -> Result<bool> {
    let code_str = code.to_owned();
    let now_str  = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE referrals
             SET referred_email = ?2, status = 'registered', updated_at = ?3
           WHERE code = ?1 AND status = 'pending'",
          rusqlite::params![code_str, email, now_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn referral_by_code(&self, code: &str) -> Result<Option<Referral>> {
    let code_str = code.to_owned();

    let raw: Option<RawReferral> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM referrals WHERE code = ?1",
                RawReferral::COLUMNS
              ),
              rusqlite::params![code_str],
              RawReferral::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReferral::into_referral).transpose()
  }

  async fn complete_referral(&self, code: &str, reward_cents: i64) -> Result<bool> {
    let code_str = code.to_owned();
    let now_str  = encode_dt(Utc::now());

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE referrals
             SET status = 'paid', reward_cents = ?2, updated_at = ?3
           WHERE code = ?1 AND status = 'registered'",
          rusqlite::params![code_str, reward_cents, now_str],
        )?)
      })
      .await?;

    Ok(affected > 0)
  }

  async fn referral_stats(&self, referrer_id: Uuid) -> Result<ReferralStats> {
    let referrer_str = encode_uuid(referrer_id);

    let stats = self
      .conn
      .call(move |conn| {
        let (registered, paid, total): (i64, i64, i64) = conn.query_row(
          "SELECT
             COUNT(CASE WHEN status = 'registered' THEN 1 END),
             COUNT(CASE WHEN status = 'paid' THEN 1 END),
             COALESCE(SUM(reward_cents), 0)
           FROM referrals WHERE referrer_id = ?1",
          rusqlite::params![referrer_str],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let code: Option<String> = conn
          .query_row(
            "SELECT code FROM referrals
             WHERE referrer_id = ?1
             ORDER BY created_at ASC LIMIT 1",
            rusqlite::params![referrer_str],
            |row| row.get(0),
          )
          .optional()?;

        Ok(ReferralStats {
          registered_count:   registered as u64,
          paid_count:         paid as u64,
          total_reward_cents: total,
          code,
        })
      })
      .await?;

    Ok(stats)
  }

  async fn referrals_for(&self, referrer_id: Uuid) -> Result<Vec<Referral>> {
    let referrer_str = encode_uuid(referrer_id);

    let raws: Vec<RawReferral> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM referrals
           WHERE referrer_id = ?1 AND referred_email IS NOT NULL
           ORDER BY created_at DESC",
          RawReferral::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![referrer_str], RawReferral::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReferral::into_referral).collect()
  }
}
