//! Thread-safe wallet storage
//!
//! This module provides the `WalletStore` struct, which holds one record per
//! user behind its own mutex.
//!
//! # Design
//!
//! The store is a `DashMap` from user id to `Arc<Mutex<Wallet>>`. The map's
//! shard lock is only held long enough to look up or insert the handle; the
//! per-wallet mutex is what serializes mutations. This gives:
//! - one lock per wallet, so mutations on the same wallet serialize
//! - no shared lock between wallets, so different wallets proceed in parallel
//! - the ability to hold two wallet locks at once (transfers) without
//!   re-entering a DashMap shard, which could deadlock when both users hash
//!   to the same shard

use crate::config::LimitsConfig;
use crate::types::{UserId, Wallet};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to one wallet's lock
pub type WalletHandle = Arc<Mutex<Wallet>>;

#[derive(Debug, Default)]
pub struct WalletStore {
    wallets: DashMap<UserId, WalletHandle>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
        }
    }

    /// Get the wallet handle for a user, creating the wallet on first access
    ///
    /// If several threads race to create the same wallet, exactly one record
    /// is inserted and every caller receives a handle to it.
    pub fn get_or_create(
        &self,
        user_id: &str,
        currency: &str,
        limits: &LimitsConfig,
        now: DateTime<Utc>,
    ) -> WalletHandle {
        if let Some(handle) = self.wallets.get(user_id) {
            return Arc::clone(handle.value());
        }

        let handle = self
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(user_id, currency, limits, now))));
        Arc::clone(handle.value())
    }

    /// Get the handle of an existing wallet
    pub fn handle(&self, user_id: &str) -> Option<WalletHandle> {
        self.wallets
            .get(user_id)
            .map(|handle| Arc::clone(handle.value()))
    }

    /// Copy of a wallet's current state
    ///
    /// This is a snapshot; it may be stale as soon as it is returned.
    pub fn snapshot(&self, user_id: &str) -> Option<Wallet> {
        self.handle(user_id).map(|handle| handle.lock().clone())
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.wallets.contains_key(user_id)
    }

    /// Snapshot of every wallet, in arbitrary order
    pub fn all(&self) -> Vec<Wallet> {
        let handles: Vec<WalletHandle> = self
            .wallets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        // Lock each wallet only after the map iteration has released its shards
        handles.iter().map(|handle| handle.lock().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
