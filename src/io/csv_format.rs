//! CSV format handling for wallet operations and wallet output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `OperationRecord` structure for deserialization
//! - Conversion from CSV records to `Operation`
//! - Wallet output serialization
//!
//! Amounts travel in major units with at most two decimals (`12.50`) and
//! are converted to integer minor units on the way in. All functions are
//! pure (no I/O) for easy testing.

use crate::types::{Amount, LedgerError, UserId, Wallet};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Columns: op, user, counterparty, amount, reference. Only `op` and
/// `user` are required on every row.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OperationRecord {
    pub op: String,
    pub user: UserId,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub reference: Option<String>,
}

/// One replayable wallet operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Credit {
        user: UserId,
        amount: Amount,
        reference: Option<String>,
    },
    Debit {
        user: UserId,
        amount: Amount,
        reference: Option<String>,
    },
    Transfer {
        from: UserId,
        to: UserId,
        amount: Amount,
    },
    /// `alias` names the pending top-up for later `settle`/`fail` rows
    TopUp {
        user: UserId,
        amount: Amount,
        alias: String,
    },
    Settle {
        alias: String,
        amount: Amount,
    },
    Fail {
        alias: String,
    },
    Withdraw {
        user: UserId,
        amount: Amount,
        destination: String,
        reference: Option<String>,
    },
    Freeze {
        user: UserId,
    },
    Unfreeze {
        user: UserId,
    },
    Kyc {
        user: UserId,
    },
}

/// Parse a major-unit amount into minor units
///
/// Rejects negative values, zero, and more than two decimal places.
pub fn parse_amount(raw: &str) -> Result<Amount, String> {
    let decimal =
        Decimal::from_str(raw.trim()).map_err(|_| format!("Invalid amount '{}'", raw))?;
    if decimal <= Decimal::ZERO {
        return Err(format!("Amount must be positive, got '{}'", raw));
    }
    if decimal.normalize().scale() > 2 {
        return Err(format!("Amount '{}' has more than two decimal places", raw));
    }
    (decimal * Decimal::ONE_HUNDRED)
        .to_u64()
        .ok_or_else(|| format!("Amount '{}' is out of range", raw))
}

/// Format minor units as a two-decimal major-unit string
pub fn format_amount(minor: Amount) -> String {
    format!("{:.2}", Decimal::from_i128_with_scale(minor as i128, 2))
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Convert an OperationRecord to an Operation
///
/// Validates that each operation carries the columns it needs.
pub fn convert_operation_record(record: OperationRecord) -> Result<Operation, String> {
    let op = record.op.trim().to_lowercase();
    let user = record.user.trim().to_string();
    if user.is_empty() {
        return Err(format!("{} operation requires a user", op));
    }
    let counterparty = non_empty(record.counterparty);
    let reference = non_empty(record.reference);
    let amount = match non_empty(record.amount) {
        Some(raw) => Some(parse_amount(&raw)?),
        None => None,
    };

    let require_amount = || amount.ok_or_else(|| format!("{} for user {} requires an amount", op, user));
    let require_reference =
        || reference.clone().ok_or_else(|| format!("{} for user {} requires a reference", op, user));

    let operation = match op.as_str() {
        "credit" => Operation::Credit {
            amount: require_amount()?,
            user,
            reference,
        },
        "debit" => Operation::Debit {
            amount: require_amount()?,
            user,
            reference,
        },
        "transfer" => Operation::Transfer {
            amount: require_amount()?,
            to: counterparty
                .ok_or_else(|| format!("transfer from {} requires a counterparty", user))?,
            from: user,
        },
        "topup" => Operation::TopUp {
            amount: require_amount()?,
            alias: require_reference()?,
            user,
        },
        "settle" => Operation::Settle {
            amount: require_amount()?,
            alias: require_reference()?,
        },
        "fail" => Operation::Fail {
            alias: require_reference()?,
        },
        "withdraw" => Operation::Withdraw {
            amount: require_amount()?,
            destination: counterparty.unwrap_or_else(|| user.clone()),
            user,
            reference,
        },
        "freeze" => Operation::Freeze { user },
        "unfreeze" => Operation::Unfreeze { user },
        "kyc" => Operation::Kyc { user },
        _ => return Err(format!("Invalid operation: '{}' for user {}", record.op, user)),
    };
    Ok(operation)
}

/// Write wallet states to CSV format
///
/// Columns: user, currency, balance, daily_used, monthly_used, status.
/// Wallets are sorted by user id for deterministic output.
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "user",
        "currency",
        "balance",
        "daily_used",
        "monthly_used",
        "status",
    ])?;

    let mut sorted: Vec<&Wallet> = wallets.iter().collect();
    sorted.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    for wallet in sorted {
        writer.write_record(&[
            wallet.user_id.clone(),
            wallet.currency.clone(),
            format_amount(wallet.balance),
            format_amount(wallet.daily_used),
            format_amount(wallet.monthly_used),
            wallet.status.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::types::WalletStatus;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn record(op: &str, user: &str, counterparty: &str, amount: &str, reference: &str) -> OperationRecord {
        let field = |value: &str| (!value.is_empty()).then(|| value.to_string());
        OperationRecord {
            op: op.to_string(),
            user: user.to_string(),
            counterparty: field(counterparty),
            amount: field(amount),
            reference: field(reference),
        }
    }

    #[rstest]
    #[case::whole("50", 5_000)]
    #[case::two_decimals("12.34", 1_234)]
    #[case::one_decimal("0.5", 50)]
    #[case::trailing_zeros("1.500", 150)]
    #[case::whitespace("  7.00 ", 700)]
    fn test_parse_amount(#[case] raw: &str, #[case] expected: Amount) {
        assert_eq!(parse_amount(raw), Ok(expected));
    }

    #[rstest]
    #[case::negative("-1.00", "must be positive")]
    #[case::zero("0", "must be positive")]
    #[case::too_precise("1.001", "more than two decimal places")]
    #[case::garbage("abc", "Invalid amount")]
    fn test_parse_amount_errors(#[case] raw: &str, #[case] expected_error: &str) {
        let error = parse_amount(raw).unwrap_err();
        assert!(error.contains(expected_error), "{}", error);
    }

    #[rstest]
    #[case::credit(
        record("credit", "alice", "", "10.00", "r1"),
        Operation::Credit { user: "alice".into(), amount: 1_000, reference: Some("r1".into()) }
    )]
    #[case::debit_without_reference(
        record("DEBIT", "alice", "", "2.50", ""),
        Operation::Debit { user: "alice".into(), amount: 250, reference: None }
    )]
    #[case::transfer(
        record("transfer", "alice", "bob", "5", ""),
        Operation::Transfer { from: "alice".into(), to: "bob".into(), amount: 500 }
    )]
    #[case::topup(
        record("topup", "alice", "", "50", "t1"),
        Operation::TopUp { user: "alice".into(), amount: 5_000, alias: "t1".into() }
    )]
    #[case::settle(
        record("settle", "alice", "", "50", "t1"),
        Operation::Settle { alias: "t1".into(), amount: 5_000 }
    )]
    #[case::fail(
        record("fail", "alice", "", "", "t1"),
        Operation::Fail { alias: "t1".into() }
    )]
    #[case::withdraw_defaults_destination(
        record("withdraw", "alice", "", "3", "w1"),
        Operation::Withdraw {
            user: "alice".into(),
            amount: 300,
            destination: "alice".into(),
            reference: Some("w1".into()),
        }
    )]
    #[case::freeze(record("freeze", "alice", "", "", ""), Operation::Freeze { user: "alice".into() })]
    #[case::kyc(record("kyc", "alice", "", "", ""), Operation::Kyc { user: "alice".into() })]
    fn test_convert_operation_record(#[case] input: OperationRecord, #[case] expected: Operation) {
        assert_eq!(convert_operation_record(input), Ok(expected));
    }

    #[rstest]
    #[case::unknown_op(record("refund", "alice", "", "1", ""), "Invalid operation")]
    #[case::missing_amount(record("credit", "alice", "", "", ""), "requires an amount")]
    #[case::missing_counterparty(record("transfer", "alice", "", "1", ""), "requires a counterparty")]
    #[case::topup_without_alias(record("topup", "alice", "", "1", ""), "requires a reference")]
    #[case::missing_user(record("credit", " ", "", "1", ""), "requires a user")]
    fn test_convert_operation_record_errors(
        #[case] input: OperationRecord,
        #[case] expected_error: &str,
    ) {
        let error = convert_operation_record(input).unwrap_err();
        assert!(error.contains(expected_error), "{}", error);
    }

    #[test]
    fn test_write_wallets_csv_sorted_with_two_decimals() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let limits = LimitsConfig::default();
        let mut bob = Wallet::new("bob", "KES", &limits, now);
        bob.balance = 123_456;
        bob.daily_used = 5;
        bob.monthly_used = 5;
        bob.status = WalletStatus::Frozen;
        let alice = Wallet::new("alice", "KES", &limits, now);

        let mut output = Vec::new();
        write_wallets_csv(&[bob, alice], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,currency,balance,daily_used,monthly_used,status\n\
             alice,KES,0.00,0.00,0.00,active\n\
             bob,KES,1234.56,0.05,0.05,frozen\n"
        );
    }

    #[test]
    fn test_write_empty_wallets() {
        let mut output = Vec::new();
        write_wallets_csv(&[], &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,currency,balance,daily_used,monthly_used,status\n"
        );
    }
}
