use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

use crate::fees::{FeeTotals, FeeTracker};
use crate::token::Token;

/// Token balances of one identity.
///
/// Two balances are equal when they track the same tokens and every amount
/// matches within the token's tolerance.
#[derive(Debug, Clone, Default)]
pub struct Balances {
    amounts: BTreeMap<Token, Decimal>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: Token, amount: Decimal) -> Self {
        self.amounts.insert(token, amount);
        self
    }

    pub fn get(&self, token: &Token) -> Option<Decimal> {
        self.amounts.get(token).copied()
    }

    /// Amount held, zero when the token is not tracked
    pub fn amount(&self, token: &Token) -> Decimal {
        self.get(token).unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, token: Token, amount: Decimal) {
        self.amounts.insert(token, amount);
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.amounts.contains_key(token)
    }

    /// Add to a tracked balance, starting from zero if absent.
    pub fn credit(&mut self, token: &Token, amount: Decimal) {
        *self.amounts.entry(token.clone()).or_insert(Decimal::ZERO) += amount;
    }

    pub fn debit(&mut self, token: &Token, amount: Decimal) {
        *self.amounts.entry(token.clone()).or_insert(Decimal::ZERO) -= amount;
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.amounts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, &Decimal)> {
        self.amounts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Deduct fees drained from the tracker: native fees from native
    /// balances, underlying fees from underlying balances.
    pub fn subtract_fees(&mut self, fees: &FeeTracker) {
        let native = fees.drain_native();
        let underlying = fees.drain_underlying();
        self.subtract(native, underlying);
    }

    /// Deduct fee totals captured earlier
    pub fn subtract_fee_totals(&mut self, fees: &FeeTotals) {
        self.subtract(fees.native(), fees.underlying());
    }

    fn subtract(&mut self, native: Decimal, underlying: Decimal) {
        for (token, amount) in self.amounts.iter_mut() {
            if token.is_native() {
                *amount -= native;
            } else if token.is_underlying() {
                *amount -= underlying;
            }
        }
    }
}

impl PartialEq for Balances {
    fn eq(&self, other: &Self) -> bool {
        if self.amounts.len() != other.amounts.len() {
            return false;
        }
        self.amounts.iter().all(|(token, amount)| {
            other
                .amounts
                .get(token)
                .is_some_and(|theirs| (*amount - *theirs).abs() <= token.tolerance())
        })
    }
}

impl FromIterator<(Token, Decimal)> for Balances {
    fn from_iter<I: IntoIterator<Item = (Token, Decimal)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Balances({{")?;
        for (i, (token, amount)) in self.amounts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", token, amount.round_dp(token.display_scale()))?;
        }
        write!(f, "}})")
    }
}
