//! Settlement reconciler
//!
//! Resolves pending top-up entries exactly once, from the payment
//! collaborator's callback (`settle`) or from the expiry sweep
//! (`expire_pending`). Both run under the owning wallet's lock, so a
//! settlement serializes with every other mutation of that wallet and two
//! racing callbacks for the same reference cannot both credit it.

use super::engine::LedgerEngine;
use crate::types::{Amount, EntryStatus, LedgerEntry, LedgerError, Posting};
use chrono::TimeDelta;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// What the payment collaborator reports for a top-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Success,
    Failure,
}

impl LedgerEngine {
    /// Resolve the pending top-up issued under `reference`
    ///
    /// A settlement for an entry that is already terminal is a no-op and
    /// returns `Posting::Duplicate` with that entry. On success the wallet is
    /// credited with `amount` (the amount actually collected) and the entry's
    /// before/after balances are fixed to the values at settlement time.
    pub fn settle(
        &self,
        reference: &str,
        outcome: SettlementOutcome,
        amount: Amount,
    ) -> Result<Posting, LedgerError> {
        let pending = self
            .entries
            .topup(reference)
            .ok_or_else(|| LedgerError::unknown_reference(reference))?;
        if pending.status.is_terminal() {
            debug!(reference, status = %pending.status, "late or duplicate settlement");
            return Ok(Posting::Duplicate(pending));
        }

        let handle = self.existing_wallet(&pending.wallet_id)?;
        let mut wallet = handle.lock();

        // Another callback may have won the race for the lock.
        let current = self
            .entries
            .get(pending.id)
            .ok_or_else(|| LedgerError::unknown_reference(reference))?;
        if current.status.is_terminal() {
            return Ok(Posting::Duplicate(current));
        }

        let now = self.now();
        match outcome {
            SettlementOutcome::Failure => {
                let failed = self.entries.resolve_pending(current.id, |entry| {
                    entry.status = EntryStatus::Failed;
                    entry.settled_at = Some(now);
                })?;
                info!(user = %wallet.user_id, reference, "top-up failed");
                Ok(Posting::Applied(failed))
            }
            SettlementOutcome::Success => {
                if amount == 0 {
                    return Err(LedgerError::invalid_amount(&wallet.user_id, amount));
                }
                if !wallet.is_active() {
                    warn!(
                        user = %wallet.user_id,
                        reference,
                        status = %wallet.status,
                        "settlement for inactive wallet left pending"
                    );
                    return Err(LedgerError::wallet_inactive(&wallet.user_id, wallet.status));
                }

                let balance_before = wallet.balance;
                let balance_after = balance_before
                    .checked_add(amount)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("settle", &wallet.user_id))?;

                let completed = self.entries.resolve_pending(current.id, |entry| {
                    entry.status = EntryStatus::Completed;
                    entry.amount = amount;
                    entry.balance_before = balance_before;
                    entry.balance_after = balance_after;
                    entry.settled_at = Some(now);
                })?;
                wallet.balance = balance_after;
                wallet.updated_at = now;

                if amount != current.amount {
                    warn!(
                        user = %wallet.user_id,
                        reference,
                        requested = current.amount,
                        settled = amount,
                        "top-up settled for a different amount"
                    );
                }
                info!(
                    user = %wallet.user_id,
                    reference,
                    amount,
                    balance = balance_after,
                    "top-up settled"
                );
                Ok(Posting::Applied(completed))
            }
        }
    }

    /// Fail every pending top-up older than the configured expiry
    ///
    /// Returns the entries that were failed by this call. The balance is
    /// never touched.
    pub fn expire_pending(&self) -> Vec<LedgerEntry> {
        let now = self.now();
        let expiry = TimeDelta::from_std(self.config.pending_expiry()).unwrap_or(TimeDelta::MAX);

        let mut expired = Vec::new();
        for pending in self.entries.pending_topups() {
            if now.signed_duration_since(pending.created_at) < expiry {
                continue;
            }
            let Some(handle) = self.wallets.handle(&pending.wallet_id) else {
                continue;
            };
            let _wallet = handle.lock();

            // Settled between the scan and taking the lock.
            let Ok(failed) = self.entries.resolve_pending(pending.id, |entry| {
                entry.status = EntryStatus::Failed;
                entry.settled_at = Some(now);
            }) else {
                continue;
            };

            info!(
                user = %failed.wallet_id,
                reference = %failed.reference,
                amount = failed.amount,
                "pending top-up expired"
            );
            expired.push(failed);
        }
        expired
    }

    /// Run `expire_pending` on a fixed interval until the task is aborted
    pub fn spawn_expiry_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let period = engine.config.sweep_interval();
        info!(interval_secs = period.as_secs(), "starting pending top-up sweeper");

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let expired = engine.expire_pending();
                if !expired.is_empty() {
                    info!(count = expired.len(), "expired stale top-ups");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::core::collaborator::RecordingCollaborator;
    use crate::core::traits::{Clock, ManualClock};
    use crate::types::{EntryType, WalletStatus};
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    fn engine_with_clock() -> (Arc<LedgerEngine>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
        ));
        let engine = LedgerEngine::with_clock(
            LedgerConfig::default(),
            Arc::new(RecordingCollaborator::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();
        (Arc::new(engine), clock)
    }

    #[tokio::test]
    async fn test_successful_settlement_credits_once() {
        let (engine, _) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();

        let first = engine
            .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
            .unwrap();
        let second = engine
            .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
            .unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(first.entry(), second.entry());
        assert_eq!(engine.get_balance("alice").balance, 5_000);
        assert_eq!(engine.verify_reconciliation("alice"), Ok(5_000));
    }

    #[tokio::test]
    async fn test_settlement_snapshots_balance_at_settlement_time() {
        let (engine, clock) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();
        engine.credit("alice", 700, "cashback", None).unwrap();
        clock.advance(Duration::minutes(3));

        let settled = engine
            .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
            .unwrap()
            .into_entry();

        assert_eq!(settled.status, EntryStatus::Completed);
        assert_eq!(settled.entry_type, EntryType::Credit);
        assert_eq!(settled.balance_before, 700);
        assert_eq!(settled.balance_after, 5_700);
        assert_eq!(settled.settled_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_failed_settlement_leaves_balance() {
        let (engine, _) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();

        let failed = engine
            .settle(&ticket.reference, SettlementOutcome::Failure, 5_000)
            .unwrap();
        assert_eq!(failed.entry().status, EntryStatus::Failed);

        let late = engine
            .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
            .unwrap();
        assert!(late.is_duplicate());
        assert_eq!(late.entry().status, EntryStatus::Failed);
        assert_eq!(engine.get_balance("alice").balance, 0);
    }

    #[test]
    fn test_unknown_reference() {
        let (engine, _) = engine_with_clock();
        let result = engine.settle("never-issued", SettlementOutcome::Success, 100);
        assert_eq!(result, Err(LedgerError::unknown_reference("never-issued")));
    }

    #[tokio::test]
    async fn test_settlement_on_frozen_wallet_stays_pending() {
        let (engine, _) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();
        engine.freeze("alice").unwrap();

        let result = engine.settle(&ticket.reference, SettlementOutcome::Success, 5_000);
        assert!(matches!(result, Err(LedgerError::WalletInactive { .. })));
        assert_eq!(
            engine.entries.topup(&ticket.reference).unwrap().status,
            EntryStatus::Pending
        );

        engine.unfreeze("alice").unwrap();
        engine
            .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
            .unwrap();
        assert_eq!(engine.get_balance("alice").balance, 5_000);
        assert_eq!(engine.wallet("alice").unwrap().status, WalletStatus::Active);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_callbacks_credit_once() {
        let (engine, _) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();
        let mut tasks = vec![];

        for _ in 0..20 {
            let engine = Arc::clone(&engine);
            let reference = ticket.reference.clone();
            tasks.push(tokio::spawn(async move {
                engine.settle(&reference, SettlementOutcome::Success, 5_000)
            }));
        }

        let mut applied = 0;
        for task in tasks {
            if !task.await.unwrap().unwrap().is_duplicate() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(engine.get_balance("alice").balance, 5_000);
    }

    #[rstest]
    #[case::fresh(Duration::hours(23), 0)]
    #[case::exactly_at_expiry(Duration::hours(24), 1)]
    #[case::stale(Duration::days(3), 1)]
    #[tokio::test]
    async fn test_expire_pending(#[case] age: Duration, #[case] expected: usize) {
        let (engine, clock) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();
        clock.advance(age);

        let expired = engine.expire_pending();

        assert_eq!(expired.len(), expected);
        if expected == 1 {
            assert_eq!(expired[0].reference, ticket.reference);
            let late = engine
                .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
                .unwrap();
            assert!(late.is_duplicate());
        }
        assert_eq!(engine.get_balance("alice").balance, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_in_background() {
        let (engine, clock) = engine_with_clock();
        let ticket = engine.request_topup("alice", 5_000, "mpesa", "x").await.unwrap();
        clock.advance(Duration::days(2));

        let sweeper = engine.spawn_expiry_sweeper();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        sweeper.abort();

        assert_eq!(
            engine.entries.topup(&ticket.reference).unwrap().status,
            EntryStatus::Failed
        );
    }
}
