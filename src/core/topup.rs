//! Top-up requests, auto-top-up and withdrawals
//!
//! These are the flows that talk to the payment collaborator. The external
//! call always happens outside the wallet lock: the lock is taken to write
//! the pending entry (or the debit), released, and only then is the
//! collaborator awaited.

use super::engine::{new_reference, reversal_reference, LedgerEngine};
use super::mutator::PostingRequest;
use super::wallet_store::WalletHandle;
use crate::types::{Amount, EntryId, EntryStatus, EntryType, LedgerEntry, LedgerError, Posting};
use tracing::{error, info, warn};

/// Handle returned by a top-up request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUpTicket {
    /// Reference the collaborator will settle against
    pub reference: String,
    pub correlation_id: String,
    pub entry_id: EntryId,
}

/// Result of a withdrawal that the provider accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub posting: Posting,
    /// `None` when the withdrawal was an idempotent replay
    pub correlation_id: Option<String>,
}

impl LedgerEngine {
    /// Ask the payment collaborator to collect funds into a wallet
    ///
    /// Writes a `pending` credit entry whose before/after balance is the
    /// current balance, then initiates collection. Returns as soon as the
    /// collaborator has accepted the request; the balance only changes when
    /// the settlement arrives.
    pub async fn request_topup(
        &self,
        user_id: &str,
        amount: Amount,
        payment_method: &str,
        destination: &str,
    ) -> Result<TopUpTicket, LedgerError> {
        self.check_topup_bounds(amount)?;

        let handle = self.open_wallet(user_id);
        let pending = self.write_pending_topup(&handle, amount, payment_method)?;

        match self
            .collaborator
            .initiate_collection(&pending.reference, amount, destination)
            .await
        {
            Ok(correlation_id) => {
                info!(
                    user = user_id,
                    amount,
                    reference = %pending.reference,
                    correlation = %correlation_id,
                    "top-up requested"
                );
                Ok(TopUpTicket {
                    reference: pending.reference,
                    correlation_id,
                    entry_id: pending.id,
                })
            }
            Err(provider_error) => {
                warn!(
                    user = user_id,
                    reference = %pending.reference,
                    error = %provider_error,
                    "collection initiation failed"
                );
                self.fail_pending(&handle, pending.id)?;
                Err(provider_error)
            }
        }
    }

    fn write_pending_topup(
        &self,
        handle: &WalletHandle,
        amount: Amount,
        payment_method: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let wallet = handle.lock();
        if !wallet.is_active() {
            return Err(LedgerError::wallet_inactive(&wallet.user_id, wallet.status));
        }

        Ok(self.entries.append(LedgerEntry {
            id: self.entries.next_id(),
            wallet_id: wallet.user_id.clone(),
            entry_type: EntryType::Credit,
            amount,
            currency: wallet.currency.clone(),
            balance_before: wallet.balance,
            balance_after: wallet.balance,
            description: format!("Wallet top-up via {}", payment_method),
            reference: new_reference(),
            payment_method: payment_method.to_string(),
            status: EntryStatus::Pending,
            related_entry_id: None,
            created_at: self.now(),
            settled_at: None,
        }))
    }

    fn fail_pending(&self, handle: &WalletHandle, entry_id: EntryId) -> Result<LedgerEntry, LedgerError> {
        let _wallet = handle.lock();
        let now = self.now();
        self.entries.resolve_pending(entry_id, |entry| {
            entry.status = EntryStatus::Failed;
            entry.settled_at = Some(now);
        })
    }

    /// Request an auto-top-up if the wallet is configured for one and its
    /// balance has dropped below the threshold
    ///
    /// Never fails: problems are logged and `None` is returned. No new
    /// request is made while an earlier top-up of the wallet is still
    /// pending.
    pub async fn maybe_trigger_topup(&self, user_id: &str) -> Option<TopUpTicket> {
        let wallet = self.wallets.snapshot(user_id)?;
        let settings = &wallet.auto_topup;
        if !settings.enabled || wallet.balance >= settings.threshold {
            return None;
        }
        if self.entries.has_pending_topup(user_id) {
            info!(user = user_id, "auto top-up skipped, earlier top-up still pending");
            return None;
        }

        match self
            .request_topup(
                user_id,
                settings.amount,
                &settings.payment_method,
                &settings.destination,
            )
            .await
        {
            Ok(ticket) => {
                info!(
                    user = user_id,
                    balance = wallet.balance,
                    threshold = settings.threshold,
                    reference = %ticket.reference,
                    "auto top-up triggered"
                );
                Some(ticket)
            }
            Err(e) => {
                warn!(user = user_id, error = %e, "auto top-up failed");
                None
            }
        }
    }

    /// Pay funds out of a wallet through the payment collaborator
    ///
    /// The debit is applied first. If the collaborator refuses the payout,
    /// the debit is compensated with a reversal credit and the provider error
    /// is returned.
    ///
    /// Retrying with the same reference after a refused payout starts a new
    /// leg (`<reference>:retry-<n>`) rather than replaying the reversed one.
    /// A replay of a leg whose payout was accepted returns `Duplicate`.
    pub async fn withdraw(
        &self,
        user_id: &str,
        amount: Amount,
        destination: &str,
        reference: Option<&str>,
    ) -> Result<Withdrawal, LedgerError> {
        let base = reference.map(str::to_string).unwrap_or_else(new_reference);
        let mut leg = 0;
        let (reference, posting) = loop {
            let leg_reference = withdrawal_leg_reference(&base, leg);
            let posting = self.mutate(
                user_id,
                PostingRequest::debit(amount, "Withdrawal")
                    .with_reference(&leg_reference)
                    .with_payment_method("payout"),
            )?;
            if !posting.is_duplicate() {
                break (leg_reference, posting);
            }
            if self
                .entries
                .find_by_reference(user_id, &reversal_reference(&leg_reference))
                .is_none()
            {
                return Ok(Withdrawal {
                    posting,
                    correlation_id: None,
                });
            }
            leg += 1;
        };

        match self
            .collaborator
            .initiate_payout(&reference, amount, destination)
            .await
        {
            Ok(correlation_id) => {
                info!(user = user_id, amount, reference = %reference, "payout initiated");
                self.maybe_trigger_topup(user_id).await;
                Ok(Withdrawal {
                    posting,
                    correlation_id: Some(correlation_id),
                })
            }
            Err(provider_error) => {
                warn!(
                    user = user_id,
                    reference = %reference,
                    error = %provider_error,
                    "payout initiation failed, reversing debit"
                );
                let reversal = PostingRequest::reversal(
                    amount,
                    "Reversal: withdrawal",
                    &reversal_reference(&reference),
                )
                .related_to(posting.entry().id);

                if let Err(reversal_error) = self.mutate(user_id, reversal) {
                    error!(
                        user = user_id,
                        reference = %reference,
                        amount,
                        error = %reversal_error,
                        "withdrawal reversal failed, manual reconciliation required"
                    );
                    return Err(LedgerError::reconciliation_required(
                        user_id,
                        &reference,
                        &reversal_error,
                    ));
                }
                Err(provider_error)
            }
        }
    }
}

/// Reference of the `leg`-th attempt of a withdrawal
fn withdrawal_leg_reference(reference: &str, leg: u32) -> String {
    match leg {
        0 => reference.to_string(),
        n => format!("{}:retry-{}", reference, n),
    }
}
