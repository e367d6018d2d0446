//! Wallet ledger orchestration
//!
//! This module provides the `LedgerEngine` struct, the single entry point
//! the rest of the system calls. The engine owns the wallet store, the entry
//! store and the PIN guard, and holds the injected payment collaborator and
//! clock.
//!
//! # Architecture
//!
//! ```text
//! LedgerEngine
//!     ├── WalletStore   (one mutex per wallet)
//!     ├── LedgerStore   (append-only entries + indexes)
//!     ├── PinGuard      (PIN hashes and lockout, independent of wallet locks)
//!     ├── Arc<dyn PaymentCollaborator>
//!     └── Arc<dyn Clock>
//! ```
//!
//! The operations themselves are spread over sibling modules, each adding
//! an `impl LedgerEngine` block: `mutator` (debit/credit), `transfer`,
//! `topup` (top-up requests, auto-top-up, withdrawals) and `settlement`.

use super::ledger_store::LedgerStore;
use super::pin::PinGuard;
use super::traits::{Clock, PaymentCollaborator, SystemClock};
use super::wallet_store::{WalletHandle, WalletStore};
use crate::config::LedgerConfig;
use crate::types::{
    Amount, AutoTopUp, BalanceView, EntryStatus, EntryType, LedgerEntry, LedgerError, Wallet,
    WalletStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Default and maximum page sizes for `get_history`
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug)]
pub struct LedgerEngine {
    pub(crate) config: LedgerConfig,
    pub(crate) wallets: WalletStore,
    pub(crate) entries: LedgerStore,
    pub(crate) pins: PinGuard,
    pub(crate) collaborator: Arc<dyn PaymentCollaborator>,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Filters and paging for `get_history`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    /// 1-based page number; 0 is treated as 1
    pub page: usize,
    /// Defaults to [`DEFAULT_PAGE_SIZE`], clamped to [`MAX_PAGE_SIZE`]
    pub per_page: Option<usize>,
    pub entry_type: Option<EntryType>,
    pub status: Option<EntryStatus>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn page(page: usize) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    fn matches(&self, entry: &LedgerEntry) -> bool {
        self.entry_type.is_none_or(|t| entry.entry_type == t)
            && self.status.is_none_or(|s| entry.status == s)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
    }
}

/// One page of ledger history, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub entries: Vec<LedgerEntry>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Fresh idempotency key for ledger-generated operations
pub(crate) fn new_reference() -> String {
    Uuid::new_v4().to_string()
}

/// Reference of the entry that compensates `reference`
pub fn reversal_reference(reference: &str) -> String {
    format!("{}:reversal", reference)
}

impl LedgerEngine {
    /// Create an engine that reads wall-clock time
    pub fn new(
        config: LedgerConfig,
        collaborator: Arc<dyn PaymentCollaborator>,
    ) -> Result<Self, LedgerError> {
        Self::with_clock(config, collaborator, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LedgerConfig,
        collaborator: Arc<dyn PaymentCollaborator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let pins = PinGuard::new(config.pin.clone())?;
        Ok(Self {
            config,
            wallets: WalletStore::new(),
            entries: LedgerStore::new(),
            pins,
            collaborator,
            clock,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Handle to a user's wallet, creating it on first access
    pub(crate) fn open_wallet(&self, user_id: &str) -> WalletHandle {
        self.wallets.get_or_create(
            user_id,
            &self.config.currency,
            &self.config.limits,
            self.now(),
        )
    }

    pub(crate) fn existing_wallet(&self, user_id: &str) -> Result<WalletHandle, LedgerError> {
        self.wallets
            .handle(user_id)
            .ok_or_else(|| LedgerError::wallet_not_found(user_id))
    }

    /// Current balance and limit usage, creating the wallet if needed
    pub fn get_balance(&self, user_id: &str) -> BalanceView {
        let handle = self.open_wallet(user_id);
        let mut wallet = handle.lock();
        wallet.roll_spend_windows(self.now());
        wallet.balance_view()
    }

    /// Snapshot of a wallet record
    pub fn wallet(&self, user_id: &str) -> Option<Wallet> {
        self.wallets.snapshot(user_id)
    }

    /// Snapshot of every wallet, sorted by user id
    pub fn list_wallets(&self) -> Vec<Wallet> {
        let mut wallets = self.wallets.all();
        wallets.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        wallets
    }

    /// Paginated ledger history of a wallet, newest first
    pub fn get_history(
        &self,
        user_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, LedgerError> {
        if !self.wallets.contains(user_id) {
            return Err(LedgerError::wallet_not_found(user_id));
        }

        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(1);

        let mut matching: Vec<LedgerEntry> = self
            .entries
            .entries_for(user_id)
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect();
        matching.reverse();

        let total = matching.len();
        let entries = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(HistoryPage {
            entries,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        })
    }

    /// Check the reconciliation invariant for one wallet
    ///
    /// Folding the wallet's completed entries in creation order must
    /// reproduce the stored balance. Returns the balance on success.
    pub fn verify_reconciliation(&self, user_id: &str) -> Result<Amount, LedgerError> {
        let handle = self.existing_wallet(user_id)?;
        let wallet = handle.lock();

        let folded: i128 = self
            .entries
            .entries_for(user_id)
            .iter()
            .map(LedgerEntry::balance_effect)
            .sum();

        if folded != wallet.balance as i128 {
            error!(
                user = user_id,
                stored = wallet.balance,
                folded,
                "ledger does not reproduce wallet balance"
            );
            return Err(LedgerError::BalanceMismatch {
                user: user_id.to_string(),
                stored: wallet.balance,
                folded,
            });
        }
        Ok(wallet.balance)
    }

    /// Stop all mutations on a wallet until it is unfrozen
    pub fn freeze(&self, user_id: &str) -> Result<(), LedgerError> {
        self.set_status(user_id, WalletStatus::Frozen)
    }

    pub fn unfreeze(&self, user_id: &str) -> Result<(), LedgerError> {
        self.set_status(user_id, WalletStatus::Active)
    }

    /// Close a wallet permanently; the record is kept for audit
    pub fn close(&self, user_id: &str) -> Result<(), LedgerError> {
        self.set_status(user_id, WalletStatus::Closed)
    }

    fn set_status(&self, user_id: &str, status: WalletStatus) -> Result<(), LedgerError> {
        let handle = self.existing_wallet(user_id)?;
        let mut wallet = handle.lock();

        if wallet.status == WalletStatus::Closed && status != WalletStatus::Closed {
            return Err(LedgerError::wallet_inactive(user_id, wallet.status));
        }

        let previous = wallet.status;
        wallet.status = status;
        wallet.updated_at = self.now();
        info!(user = user_id, from = %previous, to = %status, "wallet status changed");
        Ok(())
    }

    /// Replace a wallet's spend limits
    ///
    /// Lowering a limit below what was already used in the current window
    /// is allowed; further limit-counted debits then fail until the window
    /// rolls over.
    pub fn set_limits(
        &self,
        user_id: &str,
        daily_limit: Amount,
        monthly_limit: Amount,
    ) -> Result<(), LedgerError> {
        if daily_limit > monthly_limit {
            return Err(LedgerError::config(
                "daily limit must not exceed monthly limit",
            ));
        }
        let handle = self.existing_wallet(user_id)?;
        let mut wallet = handle.lock();
        wallet.daily_limit = daily_limit;
        wallet.monthly_limit = monthly_limit;
        wallet.updated_at = self.now();
        Ok(())
    }

    pub fn mark_kyc_verified(&self, user_id: &str) -> Result<(), LedgerError> {
        let handle = self.existing_wallet(user_id)?;
        let mut wallet = handle.lock();
        wallet.kyc_verified = true;
        wallet.updated_at = self.now();
        info!(user = user_id, "wallet KYC verified");
        Ok(())
    }

    /// Replace the auto-top-up settings of a wallet
    ///
    /// An enabled configuration must request an amount inside the top-up
    /// bounds, otherwise every trigger would be rejected.
    pub fn configure_auto_topup(
        &self,
        user_id: &str,
        settings: AutoTopUp,
    ) -> Result<(), LedgerError> {
        if settings.enabled {
            self.check_topup_bounds(settings.amount)?;
        }
        let handle = self.existing_wallet(user_id)?;
        let mut wallet = handle.lock();
        wallet.auto_topup = settings;
        wallet.updated_at = self.now();
        Ok(())
    }

    pub(crate) fn check_topup_bounds(&self, amount: Amount) -> Result<(), LedgerError> {
        let bounds = &self.config.topup;
        if amount < bounds.min || amount > bounds.max {
            return Err(LedgerError::AmountOutOfRange {
                amount,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(())
    }

    /// Set the transaction PIN of a wallet
    pub fn set_pin(&self, user_id: &str, pin: &str) -> Result<(), LedgerError> {
        self.open_wallet(user_id);
        self.pins.set_pin(user_id, pin)
    }

    /// Verify a PIN; wallets without a PIN always pass
    pub fn verify_pin(&self, user_id: &str, pin: &str) -> Result<(), LedgerError> {
        self.existing_wallet(user_id)?;
        self.pins.verify_pin(user_id, pin, self.now())
    }

    pub fn change_pin(&self, user_id: &str, old_pin: &str, new_pin: &str) -> Result<(), LedgerError> {
        self.existing_wallet(user_id)?;
        self.pins.change_pin(user_id, old_pin, new_pin, self.now())
    }

    pub fn has_pin(&self, user_id: &str) -> bool {
        self.pins.has_pin(user_id)
    }
}
