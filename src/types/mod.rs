//! Types module
//!
//! Contains core data structures used throughout the ledger:
//! - `wallet`: Wallet record, balance view and limit windows
//! - `entry`: Ledger entries and posting outcomes
//! - `error`: Error taxonomy for the ledger

pub mod entry;
pub mod error;
pub mod wallet;

pub use entry::{EntryId, EntryStatus, EntryType, LedgerEntry, Posting};
pub use error::LedgerError;
pub use wallet::{Amount, AutoTopUp, BalanceView, LimitWindow, UserId, Wallet, WalletStatus};
