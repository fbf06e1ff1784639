//! Collateral pool holdings and pool-token conversion math

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison tolerance for pool-token amounts
pub const POOL_TOKEN_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 12);

/// Comparison tolerance for accrued fasset fees
pub const FASSET_FEE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 5);

/// A collateral pool an identity may enter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Pool contract address
    pub address: String,

    /// Agent vault owning the pool
    pub agent_vault: String,

    /// Pool token symbol, when known
    #[serde(default)]
    pub token_symbol: Option<String>,
}

impl PoolInfo {
    pub fn new(address: impl Into<String>, agent_vault: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            agent_vault: agent_vault.into(),
            token_symbol: None,
        }
    }
}

/// An identity's position in one collateral pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolHolding {
    pub pool_address: String,

    /// Pool tokens held (debt-free plus debt-locked)
    pub pool_tokens: Decimal,

    /// Fasset fees accrued to the holder and not yet withdrawn
    pub fasset_fees: Decimal,

    #[serde(default)]
    pub token_symbol: Option<String>,

    /// Largest pool-token amount that can be exited while the pool stays
    /// above its exit collateral ratio. A derived hint; excluded from equality.
    #[serde(default)]
    pub max_amount_to_exit: Option<Decimal>,
}

impl PoolHolding {
    pub fn new(pool_address: impl Into<String>, pool_tokens: Decimal, fasset_fees: Decimal) -> Self {
        Self {
            pool_address: pool_address.into(),
            pool_tokens,
            fasset_fees,
            token_symbol: None,
            max_amount_to_exit: None,
        }
    }

    pub fn with_max_amount_to_exit(mut self, amount: Decimal) -> Self {
        self.max_amount_to_exit = Some(amount);
        self
    }

    /// True when neither tokens nor fees remain
    pub fn is_empty(&self) -> bool {
        self.pool_tokens <= POOL_TOKEN_TOLERANCE && self.fasset_fees <= FASSET_FEE_TOLERANCE
    }
}

impl PartialEq for PoolHolding {
    fn eq(&self, other: &Self) -> bool {
        self.pool_address == other.pool_address
            && self.token_symbol == other.token_symbol
            && (self.pool_tokens - other.pool_tokens).abs() <= POOL_TOKEN_TOLERANCE
            && (self.fasset_fees - other.fasset_fees).abs() <= FASSET_FEE_TOLERANCE
    }
}

impl fmt::Display for PoolHolding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolHolding(pool_address={}, pool_tokens={}, fasset_fees={}",
            self.pool_address,
            self.pool_tokens.round_dp(12),
            self.fasset_fees.round_dp(5)
        )?;
        if let Some(symbol) = &self.token_symbol {
            write!(f, ", token_symbol={symbol}")?;
        }
        write!(f, ")")
    }
}

/// Pool-wide totals read from a collateral pool at one instant.
///
/// Conversions between collateral, pool tokens and fees must reuse the same
/// read for both the real call and the predicted post-state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Native collateral held by the pool
    pub total_collateral: Decimal,

    /// Pool token supply
    pub total_pool_tokens: Decimal,

    /// Fasset fees accrued to the pool
    pub total_fasset_fees: Decimal,
}

impl PoolStats {
    pub fn new(total_collateral: Decimal, total_pool_tokens: Decimal, total_fasset_fees: Decimal) -> Self {
        Self {
            total_collateral,
            total_pool_tokens,
            total_fasset_fees,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_collateral.is_zero() || self.total_pool_tokens.is_zero()
    }

    /// Pool tokens minted for `collateral` native; 1:1 while the pool is empty.
    pub fn collateral_to_tokens(&self, collateral: Decimal) -> Decimal {
        if self.is_empty() {
            return collateral;
        }
        self.total_pool_tokens * collateral / self.total_collateral
    }

    /// Native collateral released for `tokens` pool tokens
    pub fn tokens_to_collateral(&self, tokens: Decimal) -> Decimal {
        if self.is_empty() {
            return tokens;
        }
        self.total_collateral * tokens / self.total_pool_tokens
    }

    /// Fasset fee share carried by `tokens` pool tokens
    pub fn tokens_to_fees(&self, tokens: Decimal) -> Decimal {
        if self.total_pool_tokens.is_zero() {
            return Decimal::ZERO;
        }
        self.total_fasset_fees * tokens / self.total_pool_tokens
    }
}

/// Largest pool-token amount whose collateral can leave the pool while the
/// remaining collateral still covers `backed_value_native * exit_cr`.
/// Capped at `holder_tokens`.
pub fn safe_exit_tokens(
    stats: &PoolStats,
    backed_value_native: Decimal,
    exit_collateral_ratio: Decimal,
    holder_tokens: Decimal,
) -> Decimal {
    let required = backed_value_native * exit_collateral_ratio;
    let spare = stats.total_collateral - required;
    if spare <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    stats.collateral_to_tokens(spare).min(holder_tokens).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_max_amount_to_exit() {
        let a = PoolHolding::new("0xpool", Decimal::from(10), Decimal::ONE);
        let b = a.clone().with_max_amount_to_exit(Decimal::from(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_tolerances() {
        let a = PoolHolding::new("0xpool", Decimal::from(10), Decimal::ONE);

        let mut fees_close = a.clone();
        fees_close.fasset_fees += Decimal::new(1, 6);
        assert_eq!(a, fees_close);

        let mut fees_far = a.clone();
        fees_far.fasset_fees += Decimal::new(2, 5);
        assert_ne!(a, fees_far);

        let mut tokens_far = a.clone();
        tokens_far.pool_tokens += Decimal::new(1, 11);
        assert_ne!(a, tokens_far);

        let other_pool = PoolHolding::new("0xother", Decimal::from(10), Decimal::ONE);
        assert_ne!(a, other_pool);
    }

    #[test]
    fn test_conversion_uses_pool_ratio() {
        let stats = PoolStats::new(Decimal::from(200), Decimal::from(100), Decimal::from(4));
        assert_eq!(stats.collateral_to_tokens(Decimal::from(50)), Decimal::from(25));
        assert_eq!(stats.tokens_to_collateral(Decimal::from(25)), Decimal::from(50));
        assert_eq!(stats.tokens_to_fees(Decimal::from(25)), Decimal::ONE);
    }

    #[test]
    fn test_empty_pool_converts_one_to_one() {
        let stats = PoolStats::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(stats.collateral_to_tokens(Decimal::from(7)), Decimal::from(7));
        assert_eq!(stats.tokens_to_fees(Decimal::from(7)), Decimal::ZERO);
    }

    #[test]
    fn test_safe_exit_tokens() {
        let stats = PoolStats::new(Decimal::from(1000), Decimal::from(500), Decimal::ZERO);
        // 1000 collateral, 300 backed value at CR 2 leaves 400 spare = 200 tokens
        let amount = safe_exit_tokens(&stats, Decimal::from(300), Decimal::TWO, Decimal::from(1000));
        assert_eq!(amount, Decimal::from(200));

        // capped by the holder's tokens
        let capped = safe_exit_tokens(&stats, Decimal::from(300), Decimal::TWO, Decimal::from(50));
        assert_eq!(capped, Decimal::from(50));

        // below exit CR nothing can leave
        let none = safe_exit_tokens(&stats, Decimal::from(600), Decimal::TWO, Decimal::from(50));
        assert_eq!(none, Decimal::ZERO);
    }
}
