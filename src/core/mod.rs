//! Core ledger logic
//!
//! This module contains the wallet ledger components:
//! - `traits` - Injected capabilities (payment collaborator, clock)
//! - `engine` - `LedgerEngine`, queries and wallet administration
//! - `wallet_store` - One lock per wallet
//! - `ledger_store` - Append-only entry storage and indexes
//! - `mutator` - The balance mutator (debit/credit)
//! - `transfer` - Two-wallet transfers with compensation
//! - `topup` - Top-up requests, auto-top-up, withdrawals
//! - `settlement` - Exactly-once resolution of pending top-ups
//! - `pin` - Transaction PIN hashing and lockout
//! - `collaborator` - In-process recording payment collaborator

pub mod collaborator;
pub mod engine;
pub mod ledger_store;
pub mod mutator;
pub mod pin;
pub mod settlement;
pub mod topup;
pub mod traits;
pub mod transfer;
pub mod wallet_store;

pub use collaborator::{ProviderRequest, RecordingCollaborator, RequestKind};
pub use engine::{reversal_reference, HistoryPage, HistoryQuery, LedgerEngine};
pub use ledger_store::LedgerStore;
pub use mutator::{LimitEffect, PostingRequest};
pub use pin::PinGuard;
pub use settlement::SettlementOutcome;
pub use topup::{TopUpTicket, Withdrawal};
pub use traits::{Clock, ManualClock, PaymentCollaborator, SystemClock};
pub use transfer::TransferReceipt;
pub use wallet_store::{WalletHandle, WalletStore};
