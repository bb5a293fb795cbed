//! SQLite persistence for key records.
//!
//! Everything except `open`/`migrate` works on a caller-owned
//! `Transaction`, so a whole rotation step commits or rolls back as one.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};

use super::record::KeyRecord;
use crate::crypto::EnvelopeCipher;
use crate::errors::{HcjwkError, Result};
use crate::jwk::{Jwk, JwkSet};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hostconf_jwks (
    kid           TEXT PRIMARY KEY NOT NULL,
    public_jwk    TEXT NOT NULL,
    encrypted_jwk BLOB NOT NULL,
    encryption_id TEXT NOT NULL,
    expires_at    INTEGER NOT NULL,
    revoked_at    INTEGER,
    created_at    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS hostconf_jwks_expires_at ON hostconf_jwks (expires_at);
";

const COLUMNS: &str =
    "kid, public_jwk, encrypted_jwk, encryption_id, expires_at, revoked_at, created_at";

/// Public result of `public_set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKeys {
    /// Valid, non-revoked public keys.
    pub keys: JwkSet,
    /// Kids of revoked keys that have not expired yet.
    pub revoked_kids: Vec<String>,
}

/// Open (or create) the key database at `path`.
pub fn open(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // Owner-only: the file holds sealed private keys.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    conn.busy_timeout(busy_timeout)?;
    migrate(&conn)?;
    Ok(conn)
}

/// In-memory database, used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(conn)
}

/// Create the schema if it does not exist yet.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// All records, oldest first.
pub fn list(tx: &Transaction<'_>) -> Result<Vec<KeyRecord>> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {COLUMNS} FROM hostconf_jwks ORDER BY created_at, kid"
    ))?;
    let rows = stmt.query_map([], from_row)?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Like `list`, but rows whose columns fail to decode are logged and
/// skipped. Other database errors still fail.
fn list_readable(tx: &Transaction<'_>) -> Result<Vec<KeyRecord>> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {COLUMNS} FROM hostconf_jwks ORDER BY created_at, kid"
    ))?;
    let mut records = Vec::new();
    for row in stmt.query_map([], from_row)? {
        match row {
            Ok(record) => records.push(record),
            Err(
                e @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)),
            ) => {
                tracing::warn!(error = %e, "Skipping unreadable key record");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(records)
}

pub fn get(tx: &Transaction<'_>, kid: &str) -> Result<Option<KeyRecord>> {
    let record = tx
        .query_row(
            &format!("SELECT {COLUMNS} FROM hostconf_jwks WHERE kid = ?1"),
            params![kid],
            from_row,
        )
        .optional()?;
    Ok(record)
}

/// Insert a new record. A kid that already exists is rejected.
pub fn insert(tx: &Transaction<'_>, record: &KeyRecord) -> Result<()> {
    let result = tx.execute(
        &format!("INSERT INTO hostconf_jwks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            record.kid,
            record.public_jwk,
            record.encrypted_jwk,
            record.encryption_id,
            record.expires_at.timestamp(),
            record.revoked_at.map(|t| t.timestamp()),
            record.created_at.timestamp(),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(HcjwkError::DuplicateKid(record.kid.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Mark `kid` revoked at `now` and return the updated record.
///
/// Revoking an already revoked record keeps the original `revoked_at`.
/// `revoked_at` is never earlier than `created_at`.
pub fn revoke(tx: &Transaction<'_>, kid: &str, now: DateTime<Utc>) -> Result<KeyRecord> {
    tx.execute(
        "UPDATE hostconf_jwks SET revoked_at = MAX(?2, created_at)
         WHERE kid = ?1 AND revoked_at IS NULL",
        params![kid, now.timestamp()],
    )?;
    get(tx, kid)?.ok_or_else(|| HcjwkError::NotFound(kid.to_string()))
}

/// Delete every record with `expires_at <= now`, revoked or not.
pub fn purge_expired(tx: &Transaction<'_>, now: DateTime<Utc>) -> Result<Vec<KeyRecord>> {
    let purged = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {COLUMNS} FROM hostconf_jwks WHERE expires_at <= ?1 ORDER BY created_at, kid"
        ))?;
        let rows = stmt.query_map(params![now.timestamp()], from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    tx.execute(
        "DELETE FROM hostconf_jwks WHERE expires_at <= ?1",
        params![now.timestamp()],
    )?;
    Ok(purged)
}

/// Public keys for verifiers, plus revoked kids.
///
/// Records that do not decode, or whose public JWK no longer parses, are
/// left out of the set and logged.
pub fn public_set(tx: &Transaction<'_>, now: DateTime<Utc>) -> Result<PublicKeys> {
    let mut out = PublicKeys::default();
    for record in list_readable(tx)? {
        if record.is_expired(now) {
            continue;
        }
        if record.is_revoked() {
            out.revoked_kids.push(record.kid);
            continue;
        }
        match record.public_jwk(now) {
            Ok(key) => out.keys.keys.push(key),
            Err(rejection) => {
                tracing::warn!(kid = %record.kid, reason = %rejection, "Skipping unusable public JWK");
            }
        }
    }
    Ok(out)
}

/// Decrypted private keys that are valid at `now`, newest expiry first.
pub fn signing_keys(
    tx: &Transaction<'_>,
    cipher: &EnvelopeCipher,
    encryption_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Jwk>> {
    let mut records = list_readable(tx)?;
    records.sort_by(|a, b| b.expires_at.cmp(&a.expires_at).then_with(|| a.kid.cmp(&b.kid)));

    let mut keys = Vec::new();
    for record in records {
        match record.private_jwk(cipher, encryption_id, now) {
            Ok(key) => keys.push(key),
            Err(rejection) => {
                tracing::debug!(kid = %record.kid, state = %rejection.state(), "Not a signing key");
            }
        }
    }
    Ok(keys)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<KeyRecord> {
    Ok(KeyRecord {
        kid: row.get(0)?,
        public_jwk: row.get(1)?,
        encrypted_jwk: row.get(2)?,
        encryption_id: row.get(3)?,
        expires_at: timestamp(4, row.get(4)?)?,
        revoked_at: row
            .get::<_, Option<i64>>(5)?
            .map(|secs| timestamp(5, secs))
            .transpose()?,
        created_at: timestamp(6, row.get(6)?)?,
    })
}

fn timestamp(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(secs)),
        )
    })
}
