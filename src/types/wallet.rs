//! Wallet-related types for the wallet ledger
//!
//! This module defines the Wallet record and the read-only views handed
//! out to callers. A wallet holds the only mutable balance in the system;
//! every change to it is mirrored by a ledger entry.

use crate::config::LimitsConfig;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wallet owner identifier
pub type UserId = String;

/// Amount in minor currency units (e.g. cents)
pub type Amount = u64;

/// Lifecycle state of a wallet
///
/// Only `Active` wallets accept balance mutations. `Closed` is terminal:
/// the record is kept for audit and never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Active,
    Frozen,
    Closed,
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WalletStatus::Active => "active",
            WalletStatus::Frozen => "frozen",
            WalletStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Spend window a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitWindow {
    Daily,
    Monthly,
}

impl fmt::Display for LimitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitWindow::Daily => f.write_str("daily"),
            LimitWindow::Monthly => f.write_str("monthly"),
        }
    }
}

/// Auto-top-up settings
///
/// When enabled, a debit that leaves the balance below `threshold` triggers
/// a top-up request of `amount` through `payment_method` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoTopUp {
    pub enabled: bool,
    pub threshold: Amount,
    pub amount: Amount,
    pub payment_method: String,
    /// Collaborator-specific payer address (phone number, card token, ...)
    pub destination: String,
}

/// Per-user stored-value record
///
/// Invariants maintained by the balance mutator:
/// - `balance` never goes below zero (enforced by the unsigned type and
///   checked arithmetic)
/// - `daily_used <= daily_limit` and `monthly_used <= monthly_limit` after
///   every successful limit-counted mutation
///
/// PIN hash, attempt counter and lockout live in
/// [`PinGuard`](crate::core::PinGuard), keyed by the same user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Amount,
    /// Fixed at creation
    pub currency: String,
    pub status: WalletStatus,
    pub daily_used: Amount,
    pub daily_limit: Amount,
    pub monthly_used: Amount,
    pub monthly_limit: Amount,
    /// UTC day the spend counters were last rolled on
    pub window_anchor: NaiveDate,
    pub kyc_verified: bool,
    pub auto_topup: AutoTopUp,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty active wallet with the configured default limits
    pub fn new(user_id: &str, currency: &str, limits: &LimitsConfig, now: DateTime<Utc>) -> Self {
        Wallet {
            user_id: user_id.to_string(),
            balance: 0,
            currency: currency.to_string(),
            status: WalletStatus::Active,
            daily_used: 0,
            daily_limit: limits.daily_limit,
            monthly_used: 0,
            monthly_limit: limits.monthly_limit,
            window_anchor: now.date_naive(),
            kyc_verified: false,
            auto_topup: AutoTopUp::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }

    /// Reset spend counters whose window has elapsed
    ///
    /// The daily counter rolls over at UTC midnight, the monthly counter on
    /// the first day of the UTC month. Rolling is lazy: it happens whenever
    /// the wallet is inspected or mutated, so an idle wallet keeps stale
    /// counters until the next access.
    pub fn roll_spend_windows(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today <= self.window_anchor {
            return;
        }

        self.daily_used = 0;
        if (today.year(), today.month()) != (self.window_anchor.year(), self.window_anchor.month()) {
            self.monthly_used = 0;
        }
        self.window_anchor = today;
    }

    /// Snapshot of the fields exposed through `get_balance`
    pub fn balance_view(&self) -> BalanceView {
        BalanceView {
            user_id: self.user_id.clone(),
            balance: self.balance,
            currency: self.currency.clone(),
            status: self.status,
            daily_used: self.daily_used,
            daily_limit: self.daily_limit,
            monthly_used: self.monthly_used,
            monthly_limit: self.monthly_limit,
            kyc_verified: self.kyc_verified,
        }
    }
}

/// Read-only balance summary returned by `get_balance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub user_id: UserId,
    pub balance: Amount,
    pub currency: String,
    pub status: WalletStatus,
    pub daily_used: Amount,
    pub daily_limit: Amount,
    pub monthly_used: Amount,
    pub monthly_limit: Amount,
    pub kyc_verified: bool,
}
