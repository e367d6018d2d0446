//! Balance mutator
//!
//! The only code path that changes a wallet's balance. Every call runs
//! while holding the wallet's mutex and performs, as one unit:
//! 1. idempotency check on `(wallet, reference)`
//! 2. precondition checks (status, KYC, balance, limits)
//! 3. append of a `completed` ledger entry carrying the before/after balance
//! 4. write of the new balance and spend counters
//!
//! Nothing is written when any check fails.

use super::engine::{new_reference, LedgerEngine};
use crate::types::{
    Amount, EntryId, EntryStatus, EntryType, LedgerEntry, LedgerError, LimitWindow, Posting,
    Wallet,
};
use tracing::{debug, info, warn};

/// How a posting interacts with the daily/monthly spend counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitEffect {
    /// Not counted
    None,
    /// Counted against the limits; fails with `LimitExceeded` when over
    Consume,
    /// Gives back previously consumed allowance (reversals)
    Release,
}

/// A requested balance mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingRequest {
    pub entry_type: EntryType,
    pub amount: Amount,
    pub description: String,
    /// Idempotency key; generated when absent
    pub reference: Option<String>,
    pub payment_method: String,
    pub related_entry_id: Option<EntryId>,
    pub limit_effect: LimitEffect,
    pub(crate) entry_id: Option<EntryId>,
}

impl PostingRequest {
    /// Outflow, counted against the spend limits
    pub fn debit(amount: Amount, description: &str) -> Self {
        Self::new(EntryType::Debit, amount, description, LimitEffect::Consume)
    }

    /// Inflow, not counted against any limit
    pub fn credit(amount: Amount, description: &str) -> Self {
        Self::new(EntryType::Credit, amount, description, LimitEffect::None)
    }

    /// Credit undoing an earlier debit, releasing its spend allowance
    pub fn reversal(amount: Amount, description: &str, reference: &str) -> Self {
        Self::new(EntryType::Credit, amount, description, LimitEffect::Release)
            .with_reference(reference)
            .with_payment_method("reversal")
    }

    fn new(entry_type: EntryType, amount: Amount, description: &str, limit_effect: LimitEffect) -> Self {
        Self {
            entry_type,
            amount,
            description: description.to_string(),
            reference: None,
            payment_method: "wallet".to_string(),
            related_entry_id: None,
            limit_effect,
            entry_id: None,
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }

    pub fn with_optional_reference(mut self, reference: Option<&str>) -> Self {
        self.reference = reference.map(str::to_string);
        self
    }

    pub fn with_payment_method(mut self, payment_method: &str) -> Self {
        self.payment_method = payment_method.to_string();
        self
    }

    pub fn related_to(mut self, entry_id: EntryId) -> Self {
        self.related_entry_id = Some(entry_id);
        self
    }

    /// Count a credit against the spend limits as well
    pub fn counted(mut self) -> Self {
        self.limit_effect = LimitEffect::Consume;
        self
    }

    pub(crate) fn with_entry_id(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }
}

impl LedgerEngine {
    /// Apply a posting to an existing wallet
    ///
    /// Concurrent calls on the same wallet serialize on its lock; calls on
    /// different wallets never block each other.
    pub fn mutate(&self, user_id: &str, request: PostingRequest) -> Result<Posting, LedgerError> {
        let handle = self.existing_wallet(user_id)?;
        let mut wallet = handle.lock();
        self.apply_posting(&mut wallet, request)
    }

    /// Credit a wallet, creating it on first use
    pub fn credit(
        &self,
        user_id: &str,
        amount: Amount,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Posting, LedgerError> {
        self.open_wallet(user_id);
        self.mutate(
            user_id,
            PostingRequest::credit(amount, description).with_optional_reference(reference),
        )
    }

    /// Debit a wallet, then give auto-top-up a chance to run
    ///
    /// The auto-top-up check is best effort: its failure is logged and never
    /// affects the outcome of the debit.
    pub async fn debit(
        &self,
        user_id: &str,
        amount: Amount,
        description: &str,
        reference: Option<&str>,
    ) -> Result<Posting, LedgerError> {
        let posting = self.mutate(
            user_id,
            PostingRequest::debit(amount, description).with_optional_reference(reference),
        )?;

        if !posting.is_duplicate() {
            self.maybe_trigger_topup(user_id).await;
        }
        Ok(posting)
    }

    /// Core read-modify-write; the caller holds the wallet lock
    pub(crate) fn apply_posting(
        &self,
        wallet: &mut Wallet,
        request: PostingRequest,
    ) -> Result<Posting, LedgerError> {
        let user = wallet.user_id.clone();
        let amount = request.amount;
        if amount == 0 {
            return Err(LedgerError::invalid_amount(&user, amount));
        }

        let reference = request.reference.clone().unwrap_or_else(new_reference);
        if let Some(existing) = self.entries.find_by_reference(&user, &reference) {
            if existing.status == EntryStatus::Completed {
                debug!(user = %user, reference = %reference, "replayed posting");
                return Ok(Posting::Duplicate(existing));
            }
            return Err(LedgerError::reference_conflict(&user, &reference, existing.status));
        }

        if !wallet.is_active() {
            warn!(user = %user, status = %wallet.status, "mutation on inactive wallet");
            return Err(LedgerError::wallet_inactive(&user, wallet.status));
        }

        let now = self.now();
        wallet.roll_spend_windows(now);

        let balance_before = wallet.balance;
        let balance_after = match request.entry_type {
            EntryType::Credit => balance_before
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("credit", &user))?,
            EntryType::Debit => {
                let threshold = self.config.kyc_threshold;
                if !wallet.kyc_verified && (amount > threshold || balance_before > threshold) {
                    return Err(LedgerError::kyc_required(&user, amount, threshold));
                }
                balance_before
                    .checked_sub(amount)
                    .ok_or_else(|| LedgerError::insufficient_balance(&user, balance_before, amount))?
            }
        };

        let (daily_used, monthly_used) = spend_counters_after(wallet, &request)?;

        let entry = self.entries.append(LedgerEntry {
            id: request.entry_id.unwrap_or_else(|| self.entries.next_id()),
            wallet_id: user.clone(),
            entry_type: request.entry_type,
            amount,
            currency: wallet.currency.clone(),
            balance_before,
            balance_after,
            description: request.description,
            reference,
            payment_method: request.payment_method,
            status: EntryStatus::Completed,
            related_entry_id: request.related_entry_id,
            created_at: now,
            settled_at: Some(now),
        });

        wallet.balance = balance_after;
        wallet.daily_used = daily_used;
        wallet.monthly_used = monthly_used;
        wallet.updated_at = now;

        info!(
            user = %user,
            entry = entry.id,
            kind = %entry.entry_type,
            amount,
            balance = balance_after,
            reference = %entry.reference,
            "posting applied"
        );
        Ok(Posting::Applied(entry))
    }
}

/// Spend counters after applying `request`, or `LimitExceeded`
fn spend_counters_after(
    wallet: &Wallet,
    request: &PostingRequest,
) -> Result<(Amount, Amount), LedgerError> {
    let amount = request.amount;
    match request.limit_effect {
        LimitEffect::None => Ok((wallet.daily_used, wallet.monthly_used)),
        LimitEffect::Release => Ok((
            wallet.daily_used.saturating_sub(amount),
            wallet.monthly_used.saturating_sub(amount),
        )),
        LimitEffect::Consume => {
            let daily = wallet
                .daily_used
                .checked_add(amount)
                .filter(|used| *used <= wallet.daily_limit)
                .ok_or_else(|| {
                    LedgerError::limit_exceeded(
                        &wallet.user_id,
                        LimitWindow::Daily,
                        wallet.daily_used,
                        wallet.daily_limit,
                        amount,
                    )
                })?;
            let monthly = wallet
                .monthly_used
                .checked_add(amount)
                .filter(|used| *used <= wallet.monthly_limit)
                .ok_or_else(|| {
                    LedgerError::limit_exceeded(
                        &wallet.user_id,
                        LimitWindow::Monthly,
                        wallet.monthly_used,
                        wallet.monthly_limit,
                        amount,
                    )
                })?;
            Ok((daily, monthly))
        }
    }
}
