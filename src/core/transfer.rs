//! Transfer orchestrator
//!
//! A transfer is two postings sharing one reference: a debit on the source
//! and a credit on the destination. Both wallet locks are taken up front in
//! lexicographic order of user id, so two transfers moving money in
//! opposite directions between the same pair cannot deadlock.
//!
//! If the credit leg fails after the debit leg succeeded, the debit is
//! compensated with a reversal credit on the source under the same locks,
//! and `TransferFailed` is returned. If the reversal itself cannot be
//! written, the ledger is stuck and `ReconciliationRequired` is escalated.

use super::engine::{new_reference, reversal_reference, LedgerEngine};
use super::mutator::PostingRequest;
use crate::types::{Amount, LedgerEntry, LedgerError, Wallet};
use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Both sides of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub reference: String,
    pub debit_entry: LedgerEntry,
    pub credit_entry: LedgerEntry,
}

/// Lock two distinct wallets in global order
///
/// Returns the guards in argument order regardless of acquisition order.
fn lock_pair<'a>(
    first_id: &str,
    first: &'a Mutex<Wallet>,
    second_id: &str,
    second: &'a Mutex<Wallet>,
) -> (MutexGuard<'a, Wallet>, MutexGuard<'a, Wallet>) {
    if first_id < second_id {
        let a = first.lock();
        let b = second.lock();
        (a, b)
    } else {
        let b = second.lock();
        let a = first.lock();
        (a, b)
    }
}

impl LedgerEngine {
    /// Move `amount` from one wallet to another, all or nothing
    pub async fn transfer(
        &self,
        from_user: &str,
        to_user: &str,
        amount: Amount,
        description: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        let receipt = self.transfer_locked(from_user, to_user, amount, description)?;
        self.maybe_trigger_topup(from_user).await;
        Ok(receipt)
    }

    fn transfer_locked(
        &self,
        from_user: &str,
        to_user: &str,
        amount: Amount,
        description: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        if from_user == to_user {
            return Err(LedgerError::invalid_transfer(from_user));
        }
        let minimum = self.config.transfer.minimum;
        if amount < minimum {
            return Err(LedgerError::AmountTooSmall { amount, minimum });
        }

        let source = self.existing_wallet(from_user)?;
        let destination = self.existing_wallet(to_user)?;
        let (mut source, mut destination) = lock_pair(from_user, &source, to_user, &destination);

        let reference = new_reference();
        let debit_id = self.entries.next_id();
        let counterpart_id = self.entries.next_id();

        let debit = self
            .apply_posting(
                &mut source,
                PostingRequest::debit(amount, description)
                    .with_reference(&reference)
                    .with_payment_method("transfer")
                    .related_to(counterpart_id)
                    .with_entry_id(debit_id),
            )?
            .into_entry();

        let credit = self.apply_posting(
            &mut destination,
            PostingRequest::credit(amount, description)
                .with_reference(&reference)
                .with_payment_method("transfer")
                .related_to(debit_id)
                .with_entry_id(counterpart_id),
        );

        match credit {
            Ok(credit) => {
                info!(
                    from = from_user,
                    to = to_user,
                    amount,
                    reference = %reference,
                    "transfer completed"
                );
                Ok(TransferReceipt {
                    reference,
                    debit_entry: debit,
                    credit_entry: credit.into_entry(),
                })
            }
            Err(cause) => {
                warn!(
                    from = from_user,
                    to = to_user,
                    reference = %reference,
                    error = %cause,
                    "transfer credit leg failed, reversing debit"
                );
                let reversal = PostingRequest::reversal(
                    amount,
                    &format!("Reversal: {}", description),
                    &reversal_reference(&reference),
                )
                .related_to(debit_id)
                .with_entry_id(counterpart_id);

                match self.apply_posting(&mut source, reversal) {
                    Ok(_) => Err(LedgerError::transfer_failed(
                        from_user, to_user, &reference, &cause,
                    )),
                    Err(reversal_error) => {
                        error!(
                            user = from_user,
                            reference = %reference,
                            amount,
                            error = %reversal_error,
                            "transfer reversal failed, manual reconciliation required"
                        );
                        Err(LedgerError::reconciliation_required(
                            from_user,
                            &reference,
                            &reversal_error,
                        ))
                    }
                }
            }
        }
    }
}
