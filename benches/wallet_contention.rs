//! Benchmark suite for per-wallet locking
//!
//! Compares debits that all hit one wallet (contended, serialized on its
//! lock) with debits spread over one wallet per thread (uncontended, fully
//! parallel), using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use std::sync::Arc;
use std::thread;
use wallet_ledger::core::RecordingCollaborator;
use wallet_ledger::{LedgerConfig, LedgerEngine, PostingRequest};

const DEBITS_PER_THREAD: usize = 1_000;
const THREADS: &[usize] = &[1, 2, 4, 8];

fn main() {
    divan::main();
}

/// Engine whose limits and KYC gate never interfere with the measurement
fn engine_with_wallets(users: &[String]) -> LedgerEngine {
    let mut config = LedgerConfig::default();
    config.limits.daily_limit = u64::MAX / 2;
    config.limits.monthly_limit = u64::MAX / 2;
    config.kyc_threshold = u64::MAX;

    let engine = LedgerEngine::new(config, Arc::new(RecordingCollaborator::new()))
        .expect("valid config");
    for user in users {
        engine
            .credit(user, u64::MAX / 4, "bench seed", None)
            .expect("seed credit");
    }
    engine
}

fn run_debits(engine: &LedgerEngine, users: &[String]) {
    thread::scope(|scope| {
        for user in users {
            scope.spawn(move || {
                for _ in 0..DEBITS_PER_THREAD {
                    engine
                        .mutate(user, PostingRequest::debit(1, "bench"))
                        .expect("debit");
                }
            });
        }
    });
}

/// Every thread debits the same wallet
#[divan::bench(args = THREADS)]
fn contended_debits(bencher: divan::Bencher, threads: usize) {
    let users = vec!["shared".to_string(); threads];
    bencher
        .with_inputs(|| engine_with_wallets(&users[..1]))
        .bench_local_values(|engine| run_debits(&engine, &users));
}

/// Each thread debits its own wallet
#[divan::bench(args = THREADS)]
fn uncontended_debits(bencher: divan::Bencher, threads: usize) {
    let users: Vec<String> = (0..threads).map(|i| format!("user-{}", i)).collect();
    bencher
        .with_inputs(|| engine_with_wallets(&users))
        .bench_local_values(|engine| run_debits(&engine, &users));
}
