//! SQL schema for the Troth SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Referential and state integrity live here: foreign keys cascade contract
/// deletion into comments, collaborations, and shares; CHECK constraints pin
/// every status column to its vocabulary; UNIQUE keys back the
/// duplicate-invite and duplicate-share errors.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,   -- argon2 PHC string
    created_at    TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS templates (
    template_id TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    content     TEXT NOT NULL,
    description TEXT,
    category    TEXT,
    is_public   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contracts (
    contract_id     TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    owner_id        TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    partner_id      TEXT REFERENCES users(user_id) ON DELETE SET NULL,
    partner_email   TEXT,            -- external (unregistered) partner
    status          TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'rejected')),
    approval_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (approval_status IN ('pending', 'approved')),
    approval_token  TEXT,            -- credential for the external-approval endpoints
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id  TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    author_id   TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collaborations (
    collaboration_id TEXT PRIMARY KEY,
    contract_id      TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    inviter_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    invitee_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    status           TEXT NOT NULL DEFAULT 'pending'
                     CHECK (status IN ('pending', 'accepted')),
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (contract_id, inviter_id, invitee_id)
);

CREATE TABLE IF NOT EXISTS external_shares (
    share_id      TEXT PRIMARY KEY,
    contract_id   TEXT NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    sharer_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    partner_email TEXT NOT NULL,
    share_token   TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending'
                  CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (contract_id, partner_email)
);

CREATE TABLE IF NOT EXISTS referrals (
    referral_id    TEXT PRIMARY KEY,
    referrer_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    referred_email TEXT,
    code           TEXT NOT NULL UNIQUE,
    status         TEXT NOT NULL DEFAULT 'pending'
                   CHECK (status IN ('pending', 'registered', 'paid')),
    reward_cents   INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS contracts_owner_idx        ON contracts(owner_id);
CREATE INDEX IF NOT EXISTS contracts_partner_idx      ON contracts(partner_id);
CREATE INDEX IF NOT EXISTS contracts_token_idx        ON contracts(approval_token);
CREATE INDEX IF NOT EXISTS comments_contract_idx      ON comments(contract_id);
CREATE INDEX IF NOT EXISTS collaborations_invitee_idx ON collaborations(invitee_id);
CREATE INDEX IF NOT EXISTS shares_token_idx           ON external_shares(share_token);
CREATE INDEX IF NOT EXISTS referrals_referrer_idx     ON referrals(referrer_id);

PRAGMA user_version = 1;
";
