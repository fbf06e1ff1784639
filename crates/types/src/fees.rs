//! Running totals of fees paid by one user's flow

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fee totals accumulated since the last drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeTotals {
    pub native_gas: Decimal,
    pub native_other: Decimal,
    pub underlying_gas: Decimal,
    pub underlying_other: Decimal,
}

impl FeeTotals {
    pub fn native(&self) -> Decimal {
        self.native_gas + self.native_other
    }

    pub fn underlying(&self) -> Decimal {
        self.underlying_gas + self.underlying_other
    }
}

/// Accumulates gas and protocol fees incurred by contract writes and
/// underlying transfers.
///
/// Owned by a single user flow. Every protocol driver of that user records
/// into the same tracker; the expected-state computation drains it.
#[derive(Debug, Default)]
pub struct FeeTracker {
    totals: Mutex<FeeTotals>,
}

impl FeeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn totals(&self) -> MutexGuard<'_, FeeTotals> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gas paid for a native-chain transaction
    pub fn record_native_gas(&self, amount: Decimal) {
        self.totals().native_gas += amount;
    }

    /// Protocol fees paid in native (reservation fee, attestation request fee)
    pub fn record_native_other(&self, amount: Decimal) {
        self.totals().native_other += amount;
    }

    /// Network fee of an underlying-chain transfer
    pub fn record_underlying_gas(&self, amount: Decimal) {
        self.totals().underlying_gas += amount;
    }

    pub fn record_underlying_other(&self, amount: Decimal) {
        self.totals().underlying_other += amount;
    }

    /// Return the total native fees and reset the native counters.
    pub fn drain_native(&self) -> Decimal {
        let mut totals = self.totals();
        let fees = totals.native();
        totals.native_gas = Decimal::ZERO;
        totals.native_other = Decimal::ZERO;
        fees
    }

    /// Return the total underlying fees and reset the underlying counters.
    pub fn drain_underlying(&self) -> Decimal {
        let mut totals = self.totals();
        let fees = totals.underlying();
        totals.underlying_gas = Decimal::ZERO;
        totals.underlying_other = Decimal::ZERO;
        fees
    }

    /// Return every total and reset all counters
    pub fn drain(&self) -> FeeTotals {
        std::mem::take(&mut *self.totals())
    }

    /// Current totals without resetting
    pub fn snapshot(&self) -> FeeTotals {
        *self.totals()
    }

    pub fn reset(&self) {
        *self.totals() = FeeTotals::default();
    }
}
