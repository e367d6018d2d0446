//! Transaction PIN guard
//!
//! PINs are stored only as salted argon2id hashes. Consecutive failed
//! verifications are counted per user; reaching the configured maximum locks
//! verification for the lockout window, during which every attempt fails
//! with `PinLocked`, correct or not.
//!
//! PIN state lives in its own map and never touches wallet locks. Hashing is
//! done outside the map's shard locks; only the counter update is done while
//! holding the record.

use crate::config::PinConfig;
use crate::types::{LedgerError, UserId};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct PinRecord {
    hash: String,
    attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct PinGuard {
    config: PinConfig,
    params: Params,
    records: DashMap<UserId, PinRecord>,
}

impl PinGuard {
    /// Build a guard; fails if the argon2 cost parameters are invalid
    pub fn new(config: PinConfig) -> Result<Self, LedgerError> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| LedgerError::PinHash {
            message: e.to_string(),
        })?;

        Ok(Self {
            config,
            params,
            records: DashMap::new(),
        })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn check_format(&self, pin: &str) -> Result<(), LedgerError> {
        if pin.len() != self.config.length || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::InvalidPinFormat {
                expected_length: self.config.length,
            });
        }
        Ok(())
    }

    fn hash(&self, pin: &str) -> Result<String, LedgerError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| LedgerError::PinHash {
                message: e.to_string(),
            })?;
        Ok(hash.to_string())
    }

    fn matches(&self, pin: &str, stored: &str) -> Result<bool, LedgerError> {
        let parsed = PasswordHash::new(stored).map_err(|e| LedgerError::PinHash {
            message: e.to_string(),
        })?;
        Ok(self.hasher().verify_password(pin.as_bytes(), &parsed).is_ok())
    }

    pub fn has_pin(&self, user_id: &str) -> bool {
        self.records.contains_key(user_id)
    }

    /// Set the first PIN of a user
    pub fn set_pin(&self, user_id: &str, pin: &str) -> Result<(), LedgerError> {
        self.check_format(pin)?;
        if self.has_pin(user_id) {
            return Err(LedgerError::pin_already_set(user_id));
        }
        let hash = self.hash(pin)?;

        match self.records.entry(user_id.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::pin_already_set(user_id)),
            Entry::Vacant(slot) => {
                slot.insert(PinRecord {
                    hash,
                    attempts: 0,
                    locked_until: None,
                });
                info!(user = user_id, "PIN set");
                Ok(())
            }
        }
    }

    /// Verify a PIN attempt at `now`
    ///
    /// Users without a PIN always pass.
    pub fn verify_pin(&self, user_id: &str, pin: &str, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let stored = match self.records.get(user_id) {
            None => return Ok(()),
            Some(record) => {
                if let Some(until) = record.locked_until.filter(|until| now < *until) {
                    return Err(LedgerError::pin_locked(user_id, until));
                }
                record.hash.clone()
            }
        };

        let matched = self.matches(pin, &stored)?;

        let mut record = self
            .records
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::pin_not_set(user_id))?;
        if let Some(until) = record.locked_until {
            if now < until {
                return Err(LedgerError::pin_locked(user_id, until));
            }
            record.locked_until = None;
        }

        if matched {
            record.attempts = 0;
            return Ok(());
        }

        record.attempts += 1;
        let remaining = self.config.max_attempts.saturating_sub(record.attempts);
        if remaining == 0 {
            let lockout = TimeDelta::from_std(self.config.lockout()).unwrap_or(TimeDelta::MAX);
            let until = now.checked_add_signed(lockout).unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.locked_until = Some(until);
            record.attempts = 0;
            warn!(user = user_id, until = %until, "PIN locked after repeated failures");
        } else {
            warn!(user = user_id, remaining, "incorrect PIN");
        }
        Err(LedgerError::pin_mismatch(user_id, remaining))
    }

    /// Replace a PIN after verifying the current one
    ///
    /// A failed verification of `old_pin` counts towards the lockout.
    pub fn change_pin(
        &self,
        user_id: &str,
        old_pin: &str,
        new_pin: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if !self.has_pin(user_id) {
            return Err(LedgerError::pin_not_set(user_id));
        }
        self.check_format(new_pin)?;
        self.verify_pin(user_id, old_pin, now)?;

        let hash = self.hash(new_pin)?;
        let mut record = self
            .records
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::pin_not_set(user_id))?;
        record.hash = hash;
        record.attempts = 0;
        info!(user = user_id, "PIN changed");
        Ok(())
    }
}
