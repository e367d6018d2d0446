//! Replay a CSV of wallet operations against a ledger engine
//!
//! Rows are applied in file order. A row that fails to parse or is rejected
//! by the ledger is logged and skipped; it never stops the replay. Top-up
//! rows register their `reference` column as a local alias for the
//! ledger-generated reference, so later `settle`/`fail` rows can name it.

use crate::core::{LedgerEngine, SettlementOutcome};
use crate::io::csv_format::Operation;
use crate::io::reader::OperationReader;
use crate::types::LedgerError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Payment method recorded on replayed top-ups
const REPLAY_PAYMENT_METHOD: &str = "mobile_money";

/// Counts of what a replay did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Drives operations into an engine, tracking top-up aliases
#[derive(Debug)]
pub struct Replayer<'a> {
    engine: &'a LedgerEngine,
    topup_aliases: HashMap<String, String>,
}

impl<'a> Replayer<'a> {
    pub fn new(engine: &'a LedgerEngine) -> Self {
        Self {
            engine,
            topup_aliases: HashMap::new(),
        }
    }

    fn resolve_alias(&self, alias: &str) -> Result<String, LedgerError> {
        self.topup_aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| LedgerError::unknown_reference(alias))
    }

    /// Apply one operation
    pub async fn apply(&mut self, operation: Operation) -> Result<(), LedgerError> {
        let engine = self.engine;
        match operation {
            Operation::Credit {
                user,
                amount,
                reference,
            } => {
                engine.credit(&user, amount, "Credit", reference.as_deref())?;
            }
            Operation::Debit {
                user,
                amount,
                reference,
            } => {
                engine
                    .debit(&user, amount, "Debit", reference.as_deref())
                    .await?;
            }
            Operation::Transfer { from, to, amount } => {
                engine.transfer(&from, &to, amount, "Transfer").await?;
            }
            Operation::TopUp {
                user,
                amount,
                alias,
            } => {
                let ticket = engine
                    .request_topup(&user, amount, REPLAY_PAYMENT_METHOD, &user)
                    .await?;
                debug!(alias = %alias, reference = %ticket.reference, "top-up alias registered");
                self.topup_aliases.insert(alias, ticket.reference);
            }
            Operation::Settle { alias, amount } => {
                let reference = self.resolve_alias(&alias)?;
                engine.settle(&reference, SettlementOutcome::Success, amount)?;
            }
            Operation::Fail { alias } => {
                let reference = self.resolve_alias(&alias)?;
                engine.settle(&reference, SettlementOutcome::Failure, 0)?;
            }
            Operation::Withdraw {
                user,
                amount,
                destination,
                reference,
            } => {
                engine
                    .withdraw(&user, amount, &destination, reference.as_deref())
                    .await?;
            }
            Operation::Freeze { user } => engine.freeze(&user)?,
            Operation::Unfreeze { user } => engine.unfreeze(&user)?,
            Operation::Kyc { user } => engine.mark_kyc_verified(&user)?,
        }
        Ok(())
    }
}

/// Replay every row of `path` against `engine`
///
/// Only failing to open the file is fatal.
pub async fn replay_file(engine: &LedgerEngine, path: &Path) -> Result<ReplaySummary, LedgerError> {
    let reader = OperationReader::new(path)?;
    let mut replayer = Replayer::new(engine);
    let mut summary = ReplaySummary::default();

    for row in reader {
        let operation = match row {
            Ok(operation) => operation,
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                summary.malformed += 1;
                continue;
            }
        };

        match replayer.apply(operation.clone()).await {
            Ok(()) => summary.applied += 1,
            Err(e) if e.is_retryable() => {
                warn!(operation = ?operation, error = %e, "operation rejected");
                summary.rejected += 1;
            }
            Err(e) => {
                error!(operation = ?operation, error = %e, "operation needs manual reconciliation");
                summary.rejected += 1;
            }
        }
    }

    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "replay finished"
    );
    Ok(summary)
}
