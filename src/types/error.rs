//! Error types for the wallet ledger
//!
//! Every failure is reported synchronously and never partially applies:
//! when an operation returns an error, no ledger entry has been written on
//! its behalf (the pending entry of a top-up request is the one exception,
//! and it is marked failed when collection cannot be initiated).
//!
//! # Error Categories
//!
//! - **Precondition errors**: wallet missing or inactive, insufficient balance,
//!   limits, KYC, amount bounds
//! - **Transfer errors**: invalid pairs, compensated failures, and the fatal
//!   case where compensation itself could not be written
//! - **PIN errors**: lockout, mismatch, format
//! - **External errors**: payment collaborator failures, configuration and I/O

use super::entry::EntryStatus;
use super::wallet::{Amount, LimitWindow, WalletStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for the wallet ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No wallet exists for the user
    #[error("Wallet not found for user {user}")]
    WalletNotFound { user: String },

    /// Wallet is frozen or closed and cannot be mutated
    #[error("Wallet for user {user} is {status}")]
    WalletInactive { user: String, status: WalletStatus },

    /// Amounts must be strictly positive
    #[error("Invalid amount {amount} for user {user}")]
    InvalidAmount { user: String, amount: Amount },

    #[error("Insufficient balance for user {user}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        user: String,
        balance: Amount,
        requested: Amount,
    },

    /// A limit-counted mutation would exceed the daily or monthly limit
    #[error("{window} limit exceeded for user {user}: used {used} of {limit}, requested {requested}")]
    LimitExceeded {
        user: String,
        window: LimitWindow,
        used: Amount,
        limit: Amount,
        requested: Amount,
    },

    #[error("KYC verification required for user {user} to move {amount} (threshold {threshold})")]
    KycRequired {
        user: String,
        amount: Amount,
        threshold: Amount,
    },

    /// Source and destination are the same wallet
    #[error("Invalid transfer: user {user} cannot transfer to itself")]
    InvalidTransfer { user: String },

    #[error("Transfer amount {amount} is below the minimum of {minimum}")]
    AmountTooSmall { amount: Amount, minimum: Amount },

    #[error("Top-up amount {amount} outside allowed range {min}..={max}")]
    AmountOutOfRange { amount: Amount, min: Amount, max: Amount },

    /// The credit leg failed and the debit leg was reversed
    #[error("Transfer {reference} from {from} to {to} failed and was reversed: {cause}")]
    TransferFailed {
        from: String,
        to: String,
        reference: String,
        cause: String,
    },

    /// A compensating entry could not be written; manual reconciliation needed
    #[error("Reconciliation required for user {user} on {reference}: {cause}")]
    ReconciliationRequired {
        user: String,
        reference: String,
        cause: String,
    },

    /// Settlement received for a reference the ledger never issued
    #[error("Unknown reference {reference}")]
    UnknownReference { reference: String },

    /// Reference already used on this wallet by an entry that is not completed
    #[error("Reference {reference} already used by a {status} entry for user {user}")]
    ReferenceConflict {
        user: String,
        reference: String,
        status: EntryStatus,
    },

    #[error("No PIN set for user {user}")]
    PinNotSet { user: String },

    #[error("PIN already set for user {user}")]
    PinAlreadySet { user: String },

    #[error("PIN must be exactly {expected_length} digits")]
    InvalidPinFormat { expected_length: usize },

    #[error("PIN verification locked for user {user} until {until}")]
    PinLocked { user: String, until: DateTime<Utc> },

    #[error("Incorrect PIN for user {user}, {attempts_remaining} attempts remaining")]
    PinMismatch { user: String, attempts_remaining: u32 },

    /// Hashing backend failure (bad parameters, corrupt stored hash)
    #[error("PIN hashing error: {message}")]
    PinHash { message: String },

    /// The payment collaborator rejected or failed a request
    #[error("Payment provider error for {reference}: {message}")]
    PaymentProvider { reference: String, message: String },

    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow { operation: String, user: String },

    /// Folding the completed entries does not reproduce the stored balance
    #[error("Balance mismatch for user {user}: stored {stored}, ledger {folded}")]
    BalanceMismatch {
        user: String,
        stored: Amount,
        folded: i128,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(error: toml::de::Error) -> Self {
        LedgerError::Config {
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    pub fn wallet_not_found(user: &str) -> Self {
        LedgerError::WalletNotFound {
            user: user.to_string(),
        }
    }

    pub fn wallet_inactive(user: &str, status: WalletStatus) -> Self {
        LedgerError::WalletInactive {
            user: user.to_string(),
            status,
        }
    }

    pub fn invalid_amount(user: &str, amount: Amount) -> Self {
        LedgerError::InvalidAmount {
            user: user.to_string(),
            amount,
        }
    }

    pub fn insufficient_balance(user: &str, balance: Amount, requested: Amount) -> Self {
        LedgerError::InsufficientBalance {
            user: user.to_string(),
            balance,
            requested,
        }
    }

    pub fn limit_exceeded(
        user: &str,
        window: LimitWindow,
        used: Amount,
        limit: Amount,
        requested: Amount,
    ) -> Self {
        LedgerError::LimitExceeded {
            user: user.to_string(),
            window,
            used,
            limit,
            requested,
        }
    }

    pub fn kyc_required(user: &str, amount: Amount, threshold: Amount) -> Self {
        LedgerError::KycRequired {
            user: user.to_string(),
            amount,
            threshold,
        }
    }

    pub fn invalid_transfer(user: &str) -> Self {
        LedgerError::InvalidTransfer {
            user: user.to_string(),
        }
    }

    pub fn transfer_failed(from: &str, to: &str, reference: &str, cause: &LedgerError) -> Self {
        LedgerError::TransferFailed {
            from: from.to_string(),
            to: to.to_string(),
            reference: reference.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn reconciliation_required(user: &str, reference: &str, cause: &LedgerError) -> Self {
        LedgerError::ReconciliationRequired {
            user: user.to_string(),
            reference: reference.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn unknown_reference(reference: &str) -> Self {
        LedgerError::UnknownReference {
            reference: reference.to_string(),
        }
    }

    pub fn reference_conflict(user: &str, reference: &str, status: EntryStatus) -> Self {
        LedgerError::ReferenceConflict {
            user: user.to_string(),
            reference: reference.to_string(),
            status,
        }
    }

    pub fn pin_not_set(user: &str) -> Self {
        LedgerError::PinNotSet {
            user: user.to_string(),
        }
    }

    pub fn pin_already_set(user: &str) -> Self {
        LedgerError::PinAlreadySet {
            user: user.to_string(),
        }
    }

    pub fn pin_locked(user: &str, until: DateTime<Utc>) -> Self {
        LedgerError::PinLocked {
            user: user.to_string(),
            until,
        }
    }

    pub fn pin_mismatch(user: &str, attempts_remaining: u32) -> Self {
        LedgerError::PinMismatch {
            user: user.to_string(),
            attempts_remaining,
        }
    }

    pub fn payment_provider(reference: &str, message: impl Into<String>) -> Self {
        LedgerError::PaymentProvider {
            reference: reference.to_string(),
            message: message.into(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, user: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            user: user.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }

    /// Whether a caller may retry the same operation with the same reference
    ///
    /// Everything except a stuck compensation and a ledger/balance mismatch
    /// is safe to retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LedgerError::ReconciliationRequired { .. } | LedgerError::BalanceMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::wallet_not_found(
        LedgerError::wallet_not_found("alice"),
        "Wallet not found for user alice"
    )]
    #[case::wallet_inactive(
        LedgerError::wallet_inactive("alice", WalletStatus::Frozen),
        "Wallet for user alice is frozen"
    )]
    #[case::insufficient_balance(
        LedgerError::insufficient_balance("alice", 500, 2000),
        "Insufficient balance for user alice: balance 500, requested 2000"
    )]
    #[case::limit_exceeded(
        LedgerError::limit_exceeded("alice", LimitWindow::Daily, 900, 1000, 200),
        "daily limit exceeded for user alice: used 900 of 1000, requested 200"
    )]
    #[case::kyc_required(
        LedgerError::kyc_required("alice", 60000, 50000),
        "KYC verification required for user alice to move 60000 (threshold 50000)"
    )]
    #[case::amount_out_of_range(
        LedgerError::AmountOutOfRange { amount: 50, min: 100, max: 150000 },
        "Top-up amount 50 outside allowed range 100..=150000"
    )]
    #[case::parse_error_with_line(
        LedgerError::ParseError { line: Some(42), message: "bad field".to_string() },
        "CSV parse error at line 42: bad field"
    )]
    #[case::parse_error_without_line(
        LedgerError::ParseError { line: None, message: "bad field".to_string() },
        "CSV parse error: bad field"
    )]
    #[case::pin_mismatch(
        LedgerError::pin_mismatch("alice", 3),
        "Incorrect PIN for user alice, 3 attempts remaining"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_transfer_failed_carries_cause() {
        let cause = LedgerError::wallet_inactive("bob", WalletStatus::Closed);
        let error = LedgerError::transfer_failed("alice", "bob", "ref-9", &cause);

        assert_eq!(
            error.to_string(),
            "Transfer ref-9 from alice to bob failed and was reversed: Wallet for user bob is closed"
        );
    }

    #[rstest]
    #[case::insufficient(LedgerError::insufficient_balance("a", 0, 1), true)]
    #[case::provider(LedgerError::payment_provider("r", "timeout"), true)]
    #[case::stuck(
        LedgerError::ReconciliationRequired { user: "a".into(), reference: "r".into(), cause: "x".into() },
        false
    )]
    #[case::mismatch(
        LedgerError::BalanceMismatch { user: "a".into(), stored: 1, folded: 2 },
        false
    )]
    fn test_is_retryable(#[case] error: LedgerError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
