//! Ledger-wide properties exercised through the public API

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rstest::rstest;
use wallet_ledger::core::{Clock, ManualClock, RecordingCollaborator};
use wallet_ledger::{
    EntryStatus, EntryType, HistoryQuery, LedgerConfig, LedgerEngine, LedgerError,
    SettlementOutcome,
};

fn fast_config() -> LedgerConfig {
    let mut config = LedgerConfig::default();
    config.pin.hash_memory_kib = 1024;
    config.pin.hash_iterations = 1;
    config
}

fn engine() -> Arc<LedgerEngine> {
    Arc::new(LedgerEngine::new(fast_config(), Arc::new(RecordingCollaborator::new())).unwrap())
}

fn engine_with_clock() -> (Arc<LedgerEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 4, 30, 22, 0, 0).unwrap(),
    ));
    let engine = LedgerEngine::with_clock(
        fast_config(),
        Arc::new(RecordingCollaborator::new()),
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .unwrap();
    (Arc::new(engine), clock)
}

fn folded_balance(engine: &LedgerEngine, user: &str) -> i128 {
    let mut folded = 0i128;
    let mut page = 1;
    loop {
        let result = engine
            .get_history(
                user,
                &HistoryQuery {
                    per_page: Some(100),
                    status: Some(EntryStatus::Completed),
                    ..HistoryQuery::page(page)
                },
            )
            .unwrap();
        folded += result
            .entries
            .iter()
            .map(|entry| match entry.entry_type {
                EntryType::Credit => entry.amount as i128,
                EntryType::Debit => -(entry.amount as i128),
            })
            .sum::<i128>();
        if page >= result.total_pages {
            return folded;
        }
        page += 1;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn example_scenario_from_topup_to_racing_debits() {
    let engine = engine();

    let ticket = engine
        .request_topup("alice", 5_000, "mobile_money", "254700000001")
        .await
        .unwrap();
    assert_eq!(engine.get_balance("alice").balance, 0);

    engine
        .settle(&ticket.reference, SettlementOutcome::Success, 5_000)
        .unwrap();
    assert_eq!(engine.get_balance("alice").balance, 5_000);
    let completed = engine
        .get_history(
            "alice",
            &HistoryQuery {
                status: Some(EntryStatus::Completed),
                ..HistoryQuery::page(1)
            },
        )
        .unwrap();
    assert_eq!(completed.total, 1);

    engine
        .debit("alice", 2_000, "order", Some("order-1"))
        .await
        .unwrap();
    assert_eq!(engine.get_balance("alice").balance, 3_000);

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.debit("alice", 2_000, "order", None).await })
    };
    let second = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.debit("alice", 2_000, "order", None).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(LedgerError::InsufficientBalance { .. }))));
    assert_eq!(engine.get_balance("alice").balance, 1_000);
    assert_eq!(engine.verify_reconciliation("alice"), Ok(1_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_debits_never_overdraw() {
    let engine = engine();
    engine.credit("bob", 10_000, "seed", None).unwrap();
    let mut tasks = vec![];

    for _ in 0..50 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            engine.debit("bob", 700, "spend", None).await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(succeeded, 14);
    assert_eq!(engine.get_balance("bob").balance, 200);
    assert_eq!(folded_balance(&engine, "bob"), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn money_is_conserved_across_random_transfers() {
    let engine = engine();
    let users = ["u1", "u2", "u3", "u4", "u5"];
    for user in users {
        engine.credit(user, 20_000, "seed", None).unwrap();
    }

    let mut tasks = vec![];
    for i in 0..300usize {
        let engine = Arc::clone(&engine);
        let from = users[i % users.len()];
        let to = users[(i * 7 + 3) % users.len()];
        let amount = 100 + (i as u64 % 9) * 150;
        tasks.push(tokio::spawn(async move {
            engine.transfer(from, to, amount, "shuffle").await
        }));
    }
    for task in tasks {
        let _ = task.await.unwrap();
    }

    let total: u64 = users.iter().map(|u| engine.get_balance(u).balance).sum();
    assert_eq!(total, 100_000);
    for user in users {
        let balance = engine.verify_reconciliation(user).unwrap();
        assert_eq!(folded_balance(&engine, user), balance as i128);
    }
}

#[tokio::test]
async fn idempotent_settlement_and_credit() {
    let engine = engine();
    let ticket = engine
        .request_topup("carol", 1_000, "mobile_money", "x")
        .await
        .unwrap();

    engine
        .settle(&ticket.reference, SettlementOutcome::Success, 1_000)
        .unwrap();
    let replay = engine
        .settle(&ticket.reference, SettlementOutcome::Success, 1_000)
        .unwrap();
    assert!(replay.is_duplicate());

    let first = engine.credit("carol", 100, "x", Some("r1")).unwrap();
    let second = engine.credit("carol", 100, "x", Some("r1")).unwrap();
    assert_eq!(first.entry(), second.entry());
    assert!(second.is_duplicate());

    assert_eq!(engine.get_balance("carol").balance, 1_100);
}

#[tokio::test]
async fn failed_transfer_leaves_source_untouched() {
    let engine = engine();
    engine.credit("dave", 4_000, "seed", None).unwrap();
    engine.get_balance("erin");
    engine.close("erin").unwrap();

    let before = engine.get_balance("dave");
    let result = engine.transfer("dave", "erin", 1_500, "rent").await;

    assert!(matches!(result, Err(LedgerError::TransferFailed { .. })));
    let after = engine.get_balance("dave");
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.daily_used, before.daily_used);
    assert_eq!(engine.verify_reconciliation("dave"), Ok(4_000));
}

#[test]
fn pin_lockout_rejects_correct_pin() {
    let (engine, clock) = engine_with_clock();
    engine.set_pin("frank", "2468").unwrap();

    for _ in 0..5 {
        assert!(matches!(
            engine.verify_pin("frank", "0000"),
            Err(LedgerError::PinMismatch { .. })
        ));
    }
    assert!(matches!(
        engine.verify_pin("frank", "2468"),
        Err(LedgerError::PinLocked { .. })
    ));

    clock.advance(Duration::minutes(30));
    assert!(engine.verify_pin("frank", "2468").is_ok());
}

#[test]
fn change_pin_requires_old_pin() {
    let (engine, _) = engine_with_clock();
    engine.set_pin("gina", "1357").unwrap();

    assert!(engine.change_pin("gina", "0000", "9753").is_err());
    engine.change_pin("gina", "1357", "9753").unwrap();
    assert!(engine.verify_pin("gina", "9753").is_ok());
}

#[tokio::test]
async fn daily_limit_blocks_debit_with_funds_available() {
    let (engine, _) = engine_with_clock();
    engine.credit("hank", 40_000, "seed", None).unwrap();
    engine.set_limits("hank", 10_000, 50_000).unwrap();

    engine.debit("hank", 8_000, "a", None).await.unwrap();
    let result = engine.debit("hank", 3_000, "b", None).await;

    assert!(matches!(result, Err(LedgerError::LimitExceeded { .. })));
    assert_eq!(engine.get_balance("hank").balance, 32_000);
}

#[rstest]
#[case::same_day(Duration::hours(1), 8_000, 8_000)]
#[case::last_minute_of_month(Duration::minutes(119), 8_000, 8_000)]
#[case::next_month(Duration::hours(3), 0, 0)]
#[tokio::test]
async fn spend_windows_roll_at_utc_boundaries(
    #[case] advance: Duration,
    #[case] expected_daily: u64,
    #[case] expected_monthly: u64,
) {
    // Clock starts 2026-04-30 22:00 UTC; the month ends two hours later.
    let (engine, clock) = engine_with_clock();
    engine.credit("ivy", 40_000, "seed", None).unwrap();
    engine.debit("ivy", 8_000, "a", None).await.unwrap();

    clock.advance(advance);
    let view = engine.get_balance("ivy");

    assert_eq!(view.daily_used, expected_daily);
    assert_eq!(view.monthly_used, expected_monthly);
}

#[tokio::test]
async fn kyc_gates_large_debits() {
    let engine = engine();
    engine.credit("jane", 60_000, "seed", None).unwrap();

    let blocked = engine.debit("jane", 1_000, "a", None).await;
    assert!(matches!(blocked, Err(LedgerError::KycRequired { .. })));

    engine.mark_kyc_verified("jane").unwrap();
    engine.debit("jane", 1_000, "a", None).await.unwrap();
    assert_eq!(engine.get_balance("jane").balance, 59_000);
}

#[tokio::test]
async fn daily_window_rolls_while_monthly_accumulates() {
    let (engine, clock) = engine_with_clock();
    clock.set(Utc.with_ymd_and_hms(2026, 4, 10, 18, 0, 0).unwrap());
    engine.credit("kim", 40_000, "seed", None).unwrap();
    engine.debit("kim", 5_000, "a", None).await.unwrap();

    clock.advance(Duration::hours(7));
    engine.debit("kim", 2_000, "b", None).await.unwrap();

    let view = engine.get_balance("kim");
    assert_eq!(view.daily_used, 2_000);
    assert_eq!(view.monthly_used, 7_000);
}
