//! Capabilities the ledger consumes
//!
//! The ledger never reaches for ambient global state: the payment
//! collaborator and the clock are constructed once by the caller and
//! injected into [`LedgerEngine`](super::LedgerEngine).

use crate::types::{Amount, LedgerError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;

/// External payment provider
///
/// The collaborator owns every protocol detail (STK push, card networks,
/// callback signatures). The ledger only hands it a `reference` to echo back
/// and expects the eventual outcome to arrive through
/// [`LedgerEngine::settle`](super::LedgerEngine::settle).
///
/// Failures must be reported as [`LedgerError::PaymentProvider`]; an
/// implementation must never fabricate a success.
#[async_trait]
pub trait PaymentCollaborator: Send + Sync + Debug {
    /// Start collecting `amount` from `destination` into the wallet
    async fn initiate_collection(
        &self,
        reference: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<String, LedgerError>;

    /// Start paying `amount` out of the wallet to `destination`
    async fn initiate_payout(
        &self,
        reference: &str,
        amount: Amount,
        destination: &str,
    ) -> Result<String, LedgerError>;
}

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Used to drive limit windows, PIN lockouts and pending expiry
/// deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::hours(25));

        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2026, 1, 2, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
