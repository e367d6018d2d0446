//! Wallet Ledger Library
//! # Overview
//!
//! This library implements a digital wallet ledger: per-user stored-value
//! balances, an append-only record of every balance-affecting event, and the
//! concurrency rules that keep both consistent under parallel access.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Wallet, LedgerEntry, LedgerError, etc.)
//! - [`config`] - TOML configuration with defaults
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - `LedgerEngine`, queries and administration
//!   - [`core::mutator`] - The balance mutator (the only code that changes a balance)
//!   - [`core::transfer`] - Two-wallet transfers with compensation
//!   - [`core::topup`] - Top-up requests, auto-top-up and withdrawals
//!   - [`core::settlement`] - Exactly-once resolution of pending top-ups
//!   - [`core::pin`] - Transaction PIN guard
//! - [`io`] - CSV replay of wallet operations and wallet output
//! - [`cli`] - CLI arguments parsing
//!
//! # Operations
//!
//! - **Credit / Debit**: change one wallet's balance, idempotent by reference
//! - **Transfer**: debit one wallet and credit another, all or nothing
//! - **Top-up**: write a pending credit and ask the payment collaborator to collect
//! - **Settle**: resolve a pending top-up exactly once
//! - **Withdraw**: debit and ask the payment collaborator to pay out
//!
//! # Guarantees
//!
//! - Mutations of one wallet serialize on that wallet's lock; different
//!   wallets never block each other
//! - Folding a wallet's completed entries reproduces its balance
//! - A balance never goes negative
//! - Replayed references and duplicate callbacks are no-ops

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use config::LedgerConfig;
pub use crate::core::{
    HistoryPage, HistoryQuery, LedgerEngine, PaymentCollaborator, PostingRequest,
    SettlementOutcome, TransferReceipt,
};
pub use io::write_wallets_csv;
pub use types::{
    Amount, BalanceView, EntryId, EntryStatus, EntryType, LedgerEntry, LedgerError, Posting,
    UserId, Wallet, WalletStatus,
};
