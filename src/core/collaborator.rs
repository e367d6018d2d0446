//! In-process payment collaborator
//!
//! `RecordingCollaborator` accepts every request, remembers it, and hands
//! back a deterministic correlation id. It backs the CLI replay, where
//! settlements are supplied by the input file, and lets tests assert what
//! the ledger asked the provider to do. It can be switched into a failing
//! mode, in which it returns a typed provider error.

use super::traits::PaymentCollaborator;
use crate::types::{Amount, LedgerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Direction of a recorded provider request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Collection,
    Payout,
}

/// One request the ledger sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub kind: RequestKind,
    pub reference: String,
    pub amount: Amount,
    pub destination: String,
    pub correlation_id: String,
}

#[derive(Debug, Default)]
pub struct RecordingCollaborator {
    requests: Mutex<Vec<ProviderRequest>>,
    failing: AtomicBool,
}

impl RecordingCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent request fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    fn record(
        &self,
        kind: RequestKind,
        reference: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<String, LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::payment_provider(
                reference,
                "provider unavailable",
            ));
        }

        let prefix = match kind {
            RequestKind::Collection => "col",
            RequestKind::Payout => "pay",
        };
        let correlation_id = format!("{}-{}", prefix, reference);
        self.requests.lock().push(ProviderRequest {
            kind,
            reference: reference.to_string(),
            amount,
            destination: destination.to_string(),
            correlation_id: correlation_id.clone(),
        });
        Ok(correlation_id)
    }
}

#[async_trait]
impl PaymentCollaborator for RecordingCollaborator {
    async fn initiate_collection(
        &self,
        reference: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<String, LedgerError> {
        self.record(RequestKind::Collection, reference, amount, destination)
    }

    async fn initiate_payout(
        &self,
        reference: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<String, LedgerError> {
        self.record(RequestKind::Payout, reference, amount, destination)
    }
}
