//! Append-only ledger entry storage
//!
//! This module provides the `LedgerStore` struct, which keeps every ledger
//! entry ever written together with the indexes the ledger needs:
//! - entries of a wallet in creation order (history, reconciliation)
//! - `(wallet, reference)` to entry (idempotent replay)
//! - top-up reference to entry (settlement lookup)
//!
//! # Concurrency contract
//!
//! The store itself is thread-safe, but it does not serialize anything per
//! wallet. Callers append entries for a wallet, and resolve its pending
//! entries, only while holding that wallet's lock. This is what makes
//! "write the balance, append the entry" one atomic unit.

use crate::types::{EntryId, EntryStatus, LedgerEntry, LedgerError, UserId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LedgerStore {
    entries: DashMap<EntryId, LedgerEntry>,
    by_wallet: DashMap<UserId, Vec<EntryId>>,
    by_reference: DashMap<(UserId, String), EntryId>,
    topups: DashMap<String, EntryId>,
    last_id: AtomicU64,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next entry id
    ///
    /// Ids are handed out in increasing order. Reserving ahead of time lets
    /// the two legs of a transfer reference each other at creation.
    pub fn next_id(&self) -> EntryId {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Append a new entry and index it
    ///
    /// Pending entries are additionally indexed as top-ups so a later
    /// settlement can find them by reference alone.
    pub fn append(&self, entry: LedgerEntry) -> LedgerEntry {
        let id = entry.id;
        let wallet_id = entry.wallet_id.clone();

        if entry.status == EntryStatus::Pending {
            self.topups.insert(entry.reference.clone(), id);
        }
        self.by_reference
            .insert((wallet_id.clone(), entry.reference.clone()), id);
        self.entries.insert(id, entry.clone());
        self.by_wallet.entry(wallet_id).or_default().push(id);

        entry
    }

    pub fn get(&self, id: EntryId) -> Option<LedgerEntry> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// Entry previously written for this wallet under `reference`
    pub fn find_by_reference(&self, wallet_id: &str, reference: &str) -> Option<LedgerEntry> {
        let id = *self
            .by_reference
            .get(&(wallet_id.to_string(), reference.to_string()))?
            .value();
        self.get(id)
    }

    /// Top-up entry issued under `reference`, whatever its current status
    pub fn topup(&self, reference: &str) -> Option<LedgerEntry> {
        let id = *self.topups.get(reference)?.value();
        self.get(id)
    }

    /// Move a pending entry to a terminal status
    ///
    /// The closure receives the entry and must set the new status along with
    /// any settlement-time fields. Entries that are already terminal are
    /// never touched.
    pub fn resolve_pending<F>(&self, id: EntryId, f: F) -> Result<LedgerEntry, LedgerError>
    where
        F: FnOnce(&mut LedgerEntry),
    {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| LedgerError::unknown_reference(&id.to_string()))?;

        if entry.status.is_terminal() {
            return Err(LedgerError::reference_conflict(
                &entry.wallet_id,
                &entry.reference,
                entry.status,
            ));
        }

        f(entry.value_mut());
        debug_assert!(entry.status.is_terminal());
        Ok(entry.value().clone())
    }

    /// All entries of a wallet, oldest first
    pub fn entries_for(&self, wallet_id: &str) -> Vec<LedgerEntry> {
        let ids = match self.by_wallet.get(wallet_id) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Top-ups still waiting for settlement
    pub fn pending_topups(&self) -> Vec<LedgerEntry> {
        let ids: Vec<EntryId> = self.topups.iter().map(|entry| *entry.value()).collect();
        let mut pending: Vec<LedgerEntry> = ids
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|entry| entry.status == EntryStatus::Pending)
            .collect();
        pending.sort_by_key(|entry| entry.id);
        pending
    }

    pub fn has_pending_topup(&self, wallet_id: &str) -> bool {
        self.entries_for(wallet_id)
            .iter()
            .any(|entry| entry.status == EntryStatus::Pending)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
