//! Per-step snapshot of everything a flow verifies

use std::fmt;

use crate::balances::Balances;
use crate::pool::PoolHolding;
use crate::status::{MintStatus, RedemptionStatus};

/// Names of the verified parts of a [`FlowState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Balances,
    MintStatus,
    RedemptionStatus,
    PoolHoldings,
}

impl StateField {
    pub const ALL: [StateField; 4] = [
        StateField::Balances,
        StateField::MintStatus,
        StateField::RedemptionStatus,
        StateField::PoolHoldings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::Balances => "balances",
            StateField::MintStatus => "mint_status",
            StateField::RedemptionStatus => "redemption_status",
            StateField::PoolHoldings => "pool_holdings",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field that differs between an expected and an observed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: StateField,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:\n    expected: {}\n    actual:   {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Aggregate user state read at the start of a step.
///
/// Never mutated after construction; the `with_*` methods produce new
/// states. Pool holdings are always kept sorted by pool address.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowState {
    balances: Balances,
    mint_status: MintStatus,
    redemption_status: RedemptionStatus,
    pool_holdings: Vec<PoolHolding>,
}

impl FlowState {
    pub fn new(
        balances: Balances,
        mint_status: MintStatus,
        redemption_status: RedemptionStatus,
        pool_holdings: Vec<PoolHolding>,
    ) -> Self {
        Self {
            balances,
            mint_status,
            redemption_status,
            pool_holdings: sorted(pool_holdings),
        }
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn mint_status(&self) -> &MintStatus {
        &self.mint_status
    }

    pub fn redemption_status(&self) -> &RedemptionStatus {
        &self.redemption_status
    }

    pub fn pool_holdings(&self) -> &[PoolHolding] {
        &self.pool_holdings
    }

    pub fn pool_holding(&self, pool_address: &str) -> Option<&PoolHolding> {
        self.pool_holdings
            .iter()
            .find(|holding| holding.pool_address == pool_address)
    }

    pub fn with_balances(&self, balances: Balances) -> Self {
        Self {
            balances,
            ..self.clone()
        }
    }

    pub fn with_mint_status(&self, mint_status: MintStatus) -> Self {
        Self {
            mint_status,
            ..self.clone()
        }
    }

    pub fn with_redemption_status(&self, redemption_status: RedemptionStatus) -> Self {
        Self {
            redemption_status,
            ..self.clone()
        }
    }

    pub fn with_pool_holdings(&self, pool_holdings: Vec<PoolHolding>) -> Self {
        Self {
            pool_holdings: sorted(pool_holdings),
            ..self.clone()
        }
    }

    /// Field-wise differences, `self` taken as the observed state
    pub fn compare(&self, expected: &FlowState) -> Vec<FieldMismatch> {
        StateField::ALL
            .iter()
            .filter_map(|field| self.mismatch(expected, *field))
            .collect()
    }

    /// Differences against every candidate, in candidate order
    pub fn compare_all(&self, candidates: &[FlowState]) -> Vec<Vec<FieldMismatch>> {
        candidates.iter().map(|c| self.compare(c)).collect()
    }

    fn mismatch(&self, expected: &FlowState, field: StateField) -> Option<FieldMismatch> {
        let differs = match field {
            StateField::Balances => self.balances != expected.balances,
            StateField::MintStatus => self.mint_status != expected.mint_status,
            StateField::RedemptionStatus => self.redemption_status != expected.redemption_status,
            StateField::PoolHoldings => self.pool_holdings != expected.pool_holdings,
        };
        differs.then(|| FieldMismatch {
            field,
            expected: expected.render(field),
            actual: self.render(field),
        })
    }

    /// Human-readable rendering of one field
    pub fn render(&self, field: StateField) -> String {
        match field {
            StateField::Balances => self.balances.to_string(),
            StateField::MintStatus => self.mint_status.to_string(),
            StateField::RedemptionStatus => self.redemption_status.to_string(),
            StateField::PoolHoldings => {
                let items: Vec<String> = self.pool_holdings.iter().map(|h| h.to_string()).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }
}

fn sorted(mut holdings: Vec<PoolHolding>) -> Vec<PoolHolding> {
    holdings.sort_by(|a, b| a.pool_address.cmp(&b.pool_address));
    holdings
}
