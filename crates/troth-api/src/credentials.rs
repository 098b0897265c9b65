//! Password hashing and signed-token issuance.
//!
//! Passwords use argon2 PHC strings. Tokens are HS256 JWTs signed with the
//! process-wide secret: session tokens carry `{sub, exp}`; share and
//! approval tokens additionally embed the contract id, the invitee email,
//! and a literal `type` discriminator so one token namespace can never be
//! replayed against the other.
//!
//! Verification failures are deliberately collapsed into one
//! [`Error::InvalidToken`] — signature mismatch, malformed payload, wrong
//! type, and expiry all look identical to the caller. The distinction is
//! logged at debug level only.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("token signing failed: {0}")]
  Sign(String),

  #[error("invalid token")]
  InvalidToken,
}

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| Error::Hash(e.to_string()))?
      .to_string(),
  )
}

/// Verify a password against a stored PHC string. Any failure — malformed
/// hash included — is just `false`; callers treat it as bad credentials.
pub fn verify_password(password: &str, hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

// ─── Claims ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
  pub sub: Uuid,
  pub exp: usize,
}

pub const TOKEN_TYPE_SHARE: &str = "external_share";
pub const TOKEN_TYPE_APPROVAL: &str = "external_approval";

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareClaims {
  pub contract_id: Uuid,
  pub email:       String,
  #[serde(rename = "type")]
  pub token_type:  String,
  pub exp:         usize,
}

// ─── Token service ───────────────────────────────────────────────────────────

/// Signs and verifies every token the service hands out. Built once at
/// startup from the configured secret; read-only afterwards.
pub struct TokenService {
  encoding:      EncodingKey,
  decoding:      DecodingKey,
  session_ttl:   Duration,
  share_ttl:     Duration,
}

impl TokenService {
  pub fn new(secret: &str, session_ttl_hours: i64, share_ttl_days: i64) -> Self {
    Self {
      encoding:    EncodingKey::from_secret(secret.as_bytes()),
      decoding:    DecodingKey::from_secret(secret.as_bytes()),
      session_ttl: Duration::hours(session_ttl_hours),
      share_ttl:   Duration::days(share_ttl_days),
    }
  }

  pub fn issue_session(&self, user_id: Uuid) -> Result<String, Error> {
    let claims = SessionClaims {
      sub: user_id,
      exp: (Utc::now() + self.session_ttl).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &self.encoding)
      .map_err(|e| Error::Sign(e.to_string()))
  }

  pub fn verify_session(&self, token: &str) -> Result<Uuid, Error> {
    let data = decode::<SessionClaims>(
      token,
      &self.decoding,
      &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
      tracing::debug!(error = %e, "session token rejected");
      Error::InvalidToken
    })?;
    Ok(data.claims.sub)
  }

  pub fn issue_share(&self, contract_id: Uuid, email: &str) -> Result<String, Error> {
    self.issue_typed(contract_id, email, TOKEN_TYPE_SHARE)
  }

  pub fn verify_share(&self, token: &str) -> Result<ShareClaims, Error> {
    self.verify_typed(token, TOKEN_TYPE_SHARE)
  }

  /// Approval tokens are matched against their stored copy by the approval
  /// endpoints rather than re-verified, so there is no `verify_approval`;
  /// signing still gives the link tamper-evident provenance and an expiry.
  pub fn issue_approval(&self, contract_id: Uuid, email: &str) -> Result<String, Error> {
    self.issue_typed(contract_id, email, TOKEN_TYPE_APPROVAL)
  }

  fn issue_typed(
    &self,
    contract_id: Uuid,
    email: &str,
    token_type: &str,
  ) -> Result<String, Error> {
    let claims = ShareClaims {
      contract_id,
      email: email.to_string(),
      token_type: token_type.to_string(),
      exp: (Utc::now() + self.share_ttl).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &self.encoding)
      .map_err(|e| Error::Sign(e.to_string()))
  }

  fn verify_typed(&self, token: &str, expected: &str) -> Result<ShareClaims, Error> {
    let data = decode::<ShareClaims>(
      token,
      &self.decoding,
      &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
      tracing::debug!(error = %e, "share token rejected");
      Error::InvalidToken
    })?;
    if data.claims.token_type != expected {
      tracing::debug!(
        got = %data.claims.token_type,
        expected,
        "token type mismatch"
      );
      return Err(Error::InvalidToken);
    }
    Ok(data.claims)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn service() -> TokenService {
    TokenService::new("test-secret", 24, 7)
  }

  #[test]
  fn password_round_trip() {
    let hash = hash_password("secret1").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("secret1", &hash));
    assert!(!verify_password("wrong", &hash));
  }

  #[test]
  fn verify_rejects_malformed_hash() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }

  #[test]
  fn session_token_round_trip() {
    let svc = service();
    let id = Uuid::new_v4();
    let token = svc.issue_session(id).unwrap();
    assert_eq!(svc.verify_session(&token).unwrap(), id);
  }

  #[test]
  fn session_token_fails_with_other_secret() {
    let token = service().issue_session(Uuid::new_v4()).unwrap();
    let other = TokenService::new("different-secret", 24, 7);
    assert!(matches!(
      other.verify_session(&token),
      Err(Error::InvalidToken)
    ));
  }

  #[test]
  fn share_token_embeds_contract_and_email() {
    let svc = service();
    let id = Uuid::new_v4();
    let token = svc.issue_share(id, "partner@external.com").unwrap();
    let claims = svc.verify_share(&token).unwrap();
    assert_eq!(claims.contract_id, id);
    assert_eq!(claims.email, "partner@external.com");
  }

  #[test]
  fn token_namespaces_do_not_cross() {
    let svc = service();
    let id = Uuid::new_v4();

    // An approval token never verifies as a share token.
    let approval = svc.issue_approval(id, "p@x.com").unwrap();
    assert!(matches!(svc.verify_share(&approval), Err(Error::InvalidToken)));

    // A session token is not a share token either.
    let session = svc.issue_session(id).unwrap();
    assert!(matches!(svc.verify_share(&session), Err(Error::InvalidToken)));
  }
}
