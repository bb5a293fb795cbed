//! `KeyManager`: the four rotation operations plus the JWKS and signing
//! read paths.
//!
//! Each operation reads `now` once, opens one transaction, and commits
//! once. Any error (or a cancellation seen before commit) drops the
//! transaction, which rolls it back.

use chrono::{DateTime, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rusqlite::{Connection, TransactionBehavior};

use super::cancel::CancelToken;
use super::clock::{Clock, SystemClock};
use super::policy::RotationPolicy;
use crate::config::{RefreshLocking, Settings};
use crate::crypto::{AppSecrets, EnvelopeCipher};
use crate::errors::{HcjwkError, Result};
use crate::jwk::{self, Jwk, KeyRejection, KeyState};
use crate::store::repository::{self, PublicKeys};
use crate::store::KeyRecord;

/// Outcome of one `refresh`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub total: usize,
    pub valid: usize,
    pub revoked: usize,
    pub expired: usize,
    pub invalid: usize,
    /// Kid of the key inserted by this refresh, if any.
    pub created: Option<String>,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyListing {
    pub kid: String,
    pub public_state: KeyState,
    pub private_state: KeyState,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct KeyManager {
    conn: Connection,
    secrets: AppSecrets,
    cipher: EnvelopeCipher,
    policy: RotationPolicy,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore + Send>,
}

impl KeyManager {
    pub fn new(conn: Connection, secrets: AppSecrets, policy: RotationPolicy) -> Result<Self> {
        let rng = StdRng::try_from_os_rng()
            .map_err(|e| HcjwkError::Generation(format!("failed to seed random source: {e}")))?;
        let cipher = EnvelopeCipher::new(secrets.encryption_key());
        Ok(Self {
            conn,
            secrets,
            cipher,
            policy,
            clock: Box::new(SystemClock),
            rng: Box::new(rng),
        })
    }

    /// Derive subkeys, check the policy, then open the database.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let secrets = AppSecrets::from_master_secret(settings.secret()?, &settings.app_name)?;
        let policy = RotationPolicy::from_settings(settings)?;
        let conn = repository::open(&settings.database, settings.busy_timeout())?;
        Self::new(conn, secrets, policy)
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn encryption_id(&self) -> &str {
        self.secrets.encryption_id()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    /// Make sure a valid key with at least `renewal_threshold` of life left
    /// exists, minting one if not.
    pub fn refresh(&mut self, cancel: &CancelToken) -> Result<RefreshReport> {
        let now = self.now();
        let renew_after = self.policy.renew_after(now)?;
        let expires_at = self.policy.expires_at(now)?;
        let behavior = match self.policy.locking() {
            RefreshLocking::Immediate => TransactionBehavior::Immediate,
            RefreshLocking::Deferred => TransactionBehavior::Deferred,
        };

        tracing::debug!(
            validity_secs = self.policy.validity().num_seconds(),
            renewal_threshold_secs = self.policy.renewal_threshold().num_seconds(),
            encryption_id = %self.secrets.encryption_id(),
            locking = ?self.policy.locking(),
            "Hostconf JWK configuration"
        );

        let tx = self.conn.transaction_with_behavior(behavior)?;
        let encryption_id = self.secrets.encryption_id();

        let records = repository::list(&tx)?;
        let mut report = RefreshReport {
            total: records.len(),
            ..RefreshReport::default()
        };
        let mut create = true;

        for record in &records {
            match record.private_jwk(&self.cipher, encryption_id, now) {
                Ok(_) => {
                    report.valid += 1;
                    if record.expires_at >= renew_after {
                        create = false;
                        tracing::debug!(
                            kid = %record.kid,
                            expires_at = %record.expires_at,
                            "Valid Hostconf JWK is after renewal threshold"
                        );
                    } else {
                        tracing::debug!(
                            kid = %record.kid,
                            expires_at = %record.expires_at,
                            "Valid Hostconf JWK"
                        );
                    }
                }
                Err(KeyRejection::Revoked) => {
                    report.revoked += 1;
                    tracing::debug!(kid = %record.kid, "Revoked Hostconf JWK");
                }
                Err(KeyRejection::Expired) => {
                    report.expired += 1;
                    tracing::debug!(kid = %record.kid, "Expired Hostconf JWK");
                }
                Err(KeyRejection::Invalid(reason)) => {
                    report.invalid += 1;
                    tracing::warn!(kid = %record.kid, reason = %reason, "Invalid Hostconf JWK");
                }
            }
        }

        tracing::info!(
            total = report.total,
            valid = report.valid,
            expired = report.expired,
            revoked = report.revoked,
            invalid = report.invalid,
            "Current JWKs in database"
        );

        if !create {
            cancel.check()?;
            tx.commit()?;
            return Ok(report);
        }

        if report.valid == 0 {
            tracing::info!("No valid JWK found in database");
        } else {
            tracing::info!(
                renew_after = %renew_after,
                "All valid JWKs expire in the renewal threshold period"
            );
        }

        let key = Jwk::generate_with_rng(&mut *self.rng, expires_at)?;
        let record = KeyRecord::seal(&key, &self.cipher, &mut *self.rng, encryption_id, now)?;
        repository::insert(&tx, &record)?;

        cancel.check()?;
        tx.commit()?;

        tracing::info!(
            kid = %record.kid,
            expires_at = %record.expires_at,
            "Created new hostconf JWK"
        );
        report.created = Some(record.kid);
        Ok(report)
    }

    /// Mark `kid` revoked. Unknown kids are `NotFound`.
    pub fn revoke(&mut self, kid: &str, cancel: &CancelToken) -> Result<KeyRecord> {
        let now = self.now();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = repository::revoke(&tx, kid, now)?;
        cancel.check()?;
        tx.commit()?;

        tracing::info!(
            kid = %record.kid,
            revoked_at = ?record.revoked_at,
            "Revoked JWK"
        );
        Ok(record)
    }

    /// Delete every record whose `expires_at` has passed.
    pub fn purge(&mut self, cancel: &CancelToken) -> Result<Vec<KeyRecord>> {
        let now = self.now();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let purged = repository::purge_expired(&tx, now)?;
        cancel.check()?;
        tx.commit()?;

        if purged.is_empty() {
            tracing::info!("Nothing to purge");
        } else {
            let kids: Vec<&str> = purged.iter().map(|r| r.kid.as_str()).collect();
            tracing::info!(count = purged.len(), kids = ?kids, "Purged keys from DB");
            for record in &purged {
                tracing::debug!(
                    kid = %record.kid,
                    expires_at = %record.expires_at,
                    revoked = record.is_revoked(),
                    "Purged key"
                );
            }
        }
        Ok(purged)
    }

    /// Classify every record without changing anything.
    pub fn list(&mut self, cancel: &CancelToken) -> Result<Vec<KeyListing>> {
        let now = self.now();
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let encryption_id = self.secrets.encryption_id();

        let listings: Vec<KeyListing> = repository::list(&tx)?
            .into_iter()
            .map(|record| KeyListing {
                public_state: record.public_state(now),
                private_state: record.private_state(&self.cipher, encryption_id, now),
                expires_at: record.expires_at,
                revoked_at: record.revoked_at,
                created_at: record.created_at,
                kid: record.kid,
            })
            .collect();

        cancel.check()?;
        tx.commit()?;

        for listing in &listings {
            tracing::info!(
                kid = %listing.kid,
                publickey = %listing.public_state,
                privatekey = %listing.private_state,
                expires = %listing.expires_at,
                "Hostconf JWK"
            );
        }
        tracing::info!(count = listings.len(), "JWKs in database");
        Ok(listings)
    }

    /// Valid public keys plus revoked kids.
    pub fn public_set(&mut self) -> Result<PublicKeys> {
        let now = self.now();
        self.public_set_at(now)
    }

    fn public_set_at(&mut self, now: DateTime<Utc>) -> Result<PublicKeys> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let public = repository::public_set(&tx, now)?;
        tx.commit()?;
        Ok(public)
    }

    /// The JWKS document served to verifiers.
    pub fn public_jwks_json(&mut self) -> Result<Vec<u8>> {
        self.public_set()?.keys.to_json()
    }

    /// Decrypted valid private keys, freshest first.
    pub fn signing_keys(&mut self) -> Result<Vec<Jwk>> {
        let now = self.now();
        self.signing_keys_at(now)
    }

    fn signing_keys_at(&mut self, now: DateTime<Utc>) -> Result<Vec<Jwk>> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let keys = repository::signing_keys(&tx, &self.cipher, self.secrets.encryption_id(), now)?;
        tx.commit()?;
        Ok(keys)
    }

    /// Sign `claims` as a compact ES256 JWS with the freshest valid key.
    pub fn sign_claims(&mut self, claims: &serde_json::Value) -> Result<String> {
        let now = self.now();
        let keys = self.signing_keys_at(now)?;
        let key = keys.first().ok_or(HcjwkError::NoSigningKey)?;
        jwk::sign_claims(key, claims, now)
    }

    /// Verify a token against the current public set.
    ///
    /// A kid that was revoked is reported as `Revoked`, distinct from a kid
    /// that was never issued.
    pub fn verify_token(&mut self, token: &str) -> Result<serde_json::Value> {
        let now = self.now();
        let public = self.public_set_at(now)?;
        match jwk::verify_claims(token, &public.keys, now) {
            Err(HcjwkError::NotFound(kid)) if public.revoked_kids.contains(&kid) => {
                Err(HcjwkError::Revoked(kid))
            }
            other => other,
        }
    }
}
