//! Table definitions, created on first run.
//!
//! Timestamps are Unix seconds. Referential integrity between tables is
//! enforced in code (see `users::delete`), not by foreign keys.

/// Users table: username is unique system-wide
pub const USERS: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT    NOT NULL UNIQUE,
    password_hash   TEXT    NOT NULL,
    is_admin        INTEGER NOT NULL DEFAULT 0,
    need_change_pwd INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
)";

/// Access keys table: the public identifier is unique system-wide
pub const ACCESS_KEYS: &str = "\
CREATE TABLE IF NOT EXISTS access_keys (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL,
    access_key    TEXT    NOT NULL UNIQUE,
    secret_digest TEXT    NOT NULL,
    created_at    INTEGER NOT NULL,
    expires_at    INTEGER,
    is_expired    INTEGER NOT NULL DEFAULT 0
)";

/// Backups table: a name is unique per owner
pub const BACKUPS: &str = "\
CREATE TABLE IF NOT EXISTS backups (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             INTEGER NOT NULL,
    name                TEXT    NOT NULL,
    data                TEXT    NOT NULL,
    size                INTEGER NOT NULL,
    sync_count          INTEGER NOT NULL DEFAULT 0,
    passwords_encrypted INTEGER NOT NULL DEFAULT 1,
    created_at          INTEGER NOT NULL,
    updated_at          INTEGER NOT NULL,
    UNIQUE (user_id, name)
)";

/// Sync ledger: append-only, backup name denormalized so rows outlive backups
pub const SYNC_RECORDS: &str = "\
CREATE TABLE IF NOT EXISTS sync_records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    backup_name   TEXT    NOT NULL,
    trans_type    TEXT    NOT NULL CHECK (trans_type IN ('upload', 'download')),
    access_key_id INTEGER NOT NULL,
    access_key    TEXT    NOT NULL,
    user_id       INTEGER NOT NULL,
    created_at    INTEGER NOT NULL
)";

pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_access_keys_user ON access_keys (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_records_user ON sync_records (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_records_created ON sync_records (created_at)",
];

/// Every statement needed for a fresh database, in order
pub fn statements() -> impl Iterator<Item = &'static str> {
    [USERS, ACCESS_KEYS, BACKUPS, SYNC_RECORDS]
        .into_iter()
        .chain(INDEXES.iter().copied())
}
