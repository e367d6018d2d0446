//! Configuration for the wallet ledger
//!
//! All policy constants live here. Every section has a `Default` so a TOML
//! file only needs to name the values it overrides.

use crate::types::{Amount, LedgerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency assigned to newly created wallets
    pub currency: String,

    /// Default spend limits for new wallets
    pub limits: LimitsConfig,

    /// Debits above this amount (or from a balance above it) need KYC
    pub kyc_threshold: Amount,

    /// Top-up bounds
    pub topup: TopUpConfig,

    /// Transfer policy
    pub transfer: TransferConfig,

    /// PIN policy and hashing cost
    pub pin: PinConfig,

    /// Age after which an unsettled top-up is failed
    pub pending_expiry_secs: u64,

    /// Period of the background expiry sweep
    pub sweep_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            limits: LimitsConfig::default(),
            kyc_threshold: 50_000,
            topup: TopUpConfig::default(),
            transfer: TransferConfig::default(),
            pin: PinConfig::default(),
            pending_expiry_secs: 24 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Spend limit defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub daily_limit: Amount,
    pub monthly_limit: Amount,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_limit: 100_000,
            monthly_limit: 1_000_000,
        }
    }
}

/// Top-up amount bounds (inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopUpConfig {
    pub min: Amount,
    pub max: Amount,
}

impl Default for TopUpConfig {
    fn default() -> Self {
        Self {
            min: 100,
            max: 150_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub minimum: Amount,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { minimum: 100 }
    }
}

/// PIN policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Exact number of digits
    pub length: usize,

    /// Consecutive failures before lockout
    pub max_attempts: u32,

    pub lockout_secs: u64,

    /// Argon2 memory cost (KiB)
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    pub hash_iterations: u32,

    /// Argon2 lanes
    pub hash_parallelism: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            length: 4,
            max_attempts: 5,
            lockout_secs: 30 * 60,
            hash_memory_kib: 19 * 1024,
            hash_iterations: 2,
            hash_parallelism: 1,
        }
    }
}

impl PinConfig {
    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, LedgerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, LedgerError> {
        let config: LedgerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the ledger cannot operate with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.currency.trim().is_empty() {
            return Err(LedgerError::config("currency must not be empty"));
        }
        if self.topup.min == 0 || self.topup.min > self.topup.max {
            return Err(LedgerError::config(format!(
                "invalid top-up bounds {}..={}",
                self.topup.min, self.topup.max
            )));
        }
        if self.limits.daily_limit > self.limits.monthly_limit {
            return Err(LedgerError::config(
                "daily limit must not exceed monthly limit",
            ));
        }
        if self.pin.length == 0 {
            return Err(LedgerError::config("PIN length must be positive"));
        }
        if self.pin.max_attempts == 0 {
            return Err(LedgerError::config("PIN max_attempts must be positive"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(LedgerError::config("sweep_interval_secs must be positive"));
        }
        Ok(())
    }

    pub fn pending_expiry(&self) -> Duration {
        Duration::from_secs(self.pending_expiry_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
