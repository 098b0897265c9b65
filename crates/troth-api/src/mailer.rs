//! Outbound mail dispatch — the one external collaborator.
//!
//! The service only relies on a success/failure contract: handlers decide
//! per call site whether a failed dispatch aborts the request (share send)
//! or is merely logged (approval decision notifications). Delivery
//! transport itself is out of scope; the production binary wires
//! [`TracingMailer`].

use std::{future::Future, pin::Pin};

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MailError(pub String);

/// Everything the service sends, one variant per mail template.
#[derive(Debug, Clone)]
pub enum OutboundMail {
  /// Collaboration invite addressed to a registered user.
  Invitation {
    to:             String,
    contract_title: String,
    inviter_email:  String,
  },
  /// A contract the recipient is involved in was updated.
  ContractUpdate {
    to:             String,
    contract_title: String,
    updater_email:  String,
  },
  /// Deep link carrying a share or approval token to an external partner.
  ShareLink {
    to:             String,
    contract_title: String,
    owner_email:    String,
    link:           String,
  },
  /// The partner decided; notify the contract's owner.
  Decision {
    to:             String,
    contract_title: String,
    partner_email:  String,
    decision:       String,
  },
}

impl OutboundMail {
  pub fn recipient(&self) -> &str {
    match self {
      Self::Invitation { to, .. }
      | Self::ContractUpdate { to, .. }
      | Self::ShareLink { to, .. }
      | Self::Decision { to, .. } => to,
    }
  }
}

pub type MailFuture<'a> =
  Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + 'a>>;

/// The dispatcher contract. Object-safe so [`crate::AppState`] can hold an
/// `Arc<dyn Mailer>` without threading another type parameter through every
/// handler.
pub trait Mailer: Send + Sync {
  fn send(&self, mail: OutboundMail) -> MailFuture<'_>;
}

/// Records every dispatch through `tracing` and reports success.
pub struct TracingMailer;

impl Mailer for TracingMailer {
  fn send(&self, mail: OutboundMail) -> MailFuture<'_> {
    Box::pin(async move {
      tracing::info!(to = mail.recipient(), kind = ?mail, "outbound mail dispatched");
      Ok(())
    })
  }
}
