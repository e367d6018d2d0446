//! Ledger entry types for the wallet ledger
//!
//! A ledger entry is the immutable snapshot of one balance-affecting event.
//! The only permitted change after creation is the transition of a
//! `Pending` top-up to `Completed` or `Failed`.

use super::wallet::{Amount, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger entry identifier
///
/// Allocated from a monotonically increasing sequence, so ordering by id is
/// ordering by creation.
pub type EntryId = u64;

/// Direction of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Credit => f.write_str("credit"),
            EntryType::Debit => f.write_str("debit"),
        }
    }
}

/// Settlement state of an entry
///
/// `Pending` is only used for externally settled top-ups. Everything the
/// ledger settles locally is written as `Completed` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => f.write_str("pending"),
            EntryStatus::Completed => f.write_str("completed"),
            EntryStatus::Failed => f.write_str("failed"),
        }
    }
}

/// One balance-affecting event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub wallet_id: UserId,
    pub entry_type: EntryType,
    /// Always positive, in minor units
    pub amount: Amount,
    pub currency: String,
    /// Balance observed when the mutation was applied
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub description: String,
    /// Idempotency key, unique per wallet
    pub reference: String,
    pub payment_method: String,
    pub status: EntryStatus,
    /// The other side of a transfer, or the debit a reversal undoes
    pub related_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    /// Set when a pending entry reaches a terminal status
    pub settled_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }

    /// Contribution of this entry to the wallet balance
    ///
    /// Only completed entries count; pending and failed entries contribute
    /// nothing.
    pub fn balance_effect(&self) -> i128 {
        if !self.is_completed() {
            return 0;
        }
        match self.entry_type {
            EntryType::Credit => self.amount as i128,
            EntryType::Debit => -(self.amount as i128),
        }
    }
}

/// Result of a balance-changing call
///
/// `Duplicate` is the idempotent replay case: an entry with the same
/// reference was already settled, and it is returned unchanged instead of
/// being applied a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posting {
    Applied(LedgerEntry),
    Duplicate(LedgerEntry),
}

impl Posting {
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            Posting::Applied(entry) | Posting::Duplicate(entry) => entry,
        }
    }

    pub fn into_entry(self) -> LedgerEntry {
        match self {
            Posting::Applied(entry) | Posting::Duplicate(entry) => entry,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Posting::Duplicate(_))
    }
}
