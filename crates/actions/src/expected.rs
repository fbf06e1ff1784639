//! Expected post-states and their verification against observed snapshots.
//!
//! Most variants predict exactly one state or a short list of candidates.
//! Variants whose outcome depends on timing outside the flow (agents paying
//! redemptions, other minters accruing pool fees) predict through a
//! predicate that carries a reference state for diff reporting.

use fasset_flow_types::{
    Balances, FieldMismatch, FlowState, PoolHolding, RedemptionState, RedemptionStatus, RequestId, Token,
    FASSET_FEE_TOLERANCE,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

pub type StatePredicate = Arc<dyn Fn(&FlowState) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum ExpectedState {
    /// The observed state must equal one of these
    OneOf(Vec<FlowState>),
    /// The observed state must satisfy `predicate`; `reference` is the
    /// likeliest outcome and the diff target on failure
    Matches {
        reference: FlowState,
        predicate: StatePredicate,
    },
}

impl ExpectedState {
    pub fn exactly(state: FlowState) -> Self {
        ExpectedState::OneOf(vec![state])
    }

    pub fn matching<F>(reference: FlowState, predicate: F) -> Self
    where
        F: Fn(&FlowState) -> bool + Send + Sync + 'static,
    {
        ExpectedState::Matches {
            reference,
            predicate: Arc::new(predicate),
        }
    }

    /// First candidate or the reference state
    pub fn reference(&self) -> Option<&FlowState> {
        match self {
            ExpectedState::OneOf(candidates) => candidates.first(),
            ExpectedState::Matches { reference, .. } => Some(reference),
        }
    }

    pub fn verify(&self, actual: &FlowState) -> Verification {
        match self {
            ExpectedState::OneOf(candidates) => {
                if candidates.iter().any(|candidate| actual == candidate) {
                    Verification::Matched
                } else {
                    Verification::Mismatched(actual.compare_all(candidates))
                }
            }
            ExpectedState::Matches { reference, predicate } => {
                if predicate(actual) {
                    Verification::Matched
                } else {
                    Verification::Mismatched(vec![actual.compare(reference)])
                }
            }
        }
    }
}

impl fmt::Debug for ExpectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedState::OneOf(candidates) => f.debug_tuple("OneOf").field(candidates).finish(),
            ExpectedState::Matches { reference, .. } => f
                .debug_struct("Matches")
                .field("reference", reference)
                .finish_non_exhaustive(),
        }
    }
}

/// Result of checking one observed state
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Matched,
    /// Differing fields, one list per candidate
    Mismatched(Vec<Vec<FieldMismatch>>),
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Matched)
    }

    /// Mismatches against the closest candidate
    pub fn closest(&self) -> &[FieldMismatch] {
        match self {
            Verification::Matched => &[],
            Verification::Mismatched(per_candidate) => per_candidate
                .iter()
                .filter(|mismatches| !mismatches.is_empty())
                .min_by_key(|mismatches| mismatches.len())
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }
}

/// Expected states for the acting user and, for partner variants, the partner
#[derive(Debug, Clone)]
pub struct Expectations {
    pub user: ExpectedState,
    pub partner: Option<ExpectedState>,
}

impl Expectations {
    pub fn user(user: ExpectedState) -> Self {
        Self { user, partner: None }
    }

    pub fn with_partner(user: ExpectedState, partner: ExpectedState) -> Self {
        Self {
            user,
            partner: Some(partner),
        }
    }
}

/// Holdings equal to `reference` except that fasset fees may have grown.
/// With `pool` set, growth is only allowed in that pool.
pub fn holdings_allow_fee_growth(reference: &[PoolHolding], actual: &[PoolHolding], pool: Option<&str>) -> bool {
    if reference.len() != actual.len() {
        return false;
    }
    reference.iter().zip(actual).all(|(expected, observed)| {
        let may_grow = pool.map_or(true, |pool| pool == expected.pool_address);
        if !may_grow {
            return expected == observed;
        }
        let fees_only = PoolHolding {
            fasset_fees: observed.fasset_fees,
            ..expected.clone()
        };
        fees_only == *observed && observed.fasset_fees + FASSET_FEE_TOLERANCE >= expected.fasset_fees
    })
}

/// Holdings like `holdings_allow_fee_growth`, also accepting a fresh holding
/// in `pool` made of fees alone when the reference has none there.
fn holdings_allow_fee_accrual(reference: &[PoolHolding], actual: &[PoolHolding], pool: Option<&str>) -> bool {
    if holdings_allow_fee_growth(reference, actual, pool) {
        return true;
    }
    let Some(pool) = pool else {
        return false;
    };
    if reference.iter().any(|holding| holding.pool_address == pool) {
        return false;
    }
    let (fresh, rest): (Vec<_>, Vec<_>) = actual.iter().cloned().partition(|h| h.pool_address == pool);
    fresh.len() == 1 && fresh[0].pool_tokens.is_zero() && holdings_allow_fee_growth(reference, &rest, None)
}

/// Everything except pool holdings must equal the reference; holdings may
/// carry extra fees accrued in `pool` (any pool when `None`).
pub fn allow_pool_fee_growth(reference: FlowState, pool: Option<String>) -> ExpectedState {
    let target = reference.clone();
    ExpectedState::matching(reference, move |actual| {
        actual.balances() == target.balances()
            && actual.mint_status() == target.mint_status()
            && actual.redemption_status() == target.redemption_status()
            && holdings_allow_fee_accrual(target.pool_holdings(), actual.pool_holdings(), pool.as_deref())
    })
}

/// A redemption created during the action with the underlying it pays
/// out once the agent settles
#[derive(Debug, Clone, PartialEq)]
pub struct NewRedemption {
    pub id: RequestId,
    pub payout: Decimal,
}

/// Predicts fresh redemptions that may each be in any of `allowed` states.
///
/// The reference puts all of them in pending. A settled one also credits
/// its payout to the underlying balance.
pub fn redemptions_in_flight(
    reference: FlowState,
    underlying: Token,
    redemptions: Vec<NewRedemption>,
    allowed: Vec<RedemptionState>,
) -> ExpectedState {
    let base = reference.clone();
    let mut pending = base.redemption_status().clone();
    pending.extend(RedemptionState::Pending, redemptions.iter().map(|r| r.id));
    let reference = base.with_redemption_status(pending);

    ExpectedState::matching(reference, move |actual| {
        let observed = actual.redemption_status();
        let mut status = base.redemption_status().clone();
        let mut balances: Balances = base.balances().clone();
        for redemption in &redemptions {
            let Some(state) = state_of(observed, redemption.id) else {
                return false;
            };
            if !allowed.contains(&state) {
                return false;
            }
            if state == RedemptionState::Success {
                balances.credit(&underlying, redemption.payout);
            }
            status.insert(state, redemption.id);
        }
        *observed == status
            && *actual.balances() == balances
            && actual.mint_status() == base.mint_status()
            && actual.pool_holdings() == base.pool_holdings()
    })
}

fn state_of(status: &RedemptionStatus, id: RequestId) -> Option<RedemptionState> {
    [
        RedemptionState::Pending,
        RedemptionState::Success,
        RedemptionState::Default,
        RedemptionState::Expired,
    ]
    .into_iter()
    .find(|state| status.ids(*state).contains(&id))
}
