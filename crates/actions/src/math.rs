//! Random amount selection

use fasset_flow_types::AgentInfo;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Uniform amount in `[low, high]`, truncated to `scale` fractional digits
/// and never below `low`
pub fn random_decimal_between<R: Rng + ?Sized>(rng: &mut R, low: Decimal, high: Decimal, scale: u32) -> Decimal {
    if high <= low {
        return low;
    }
    let fraction = Decimal::from_f64(rng.gen::<f64>()).unwrap_or(Decimal::ZERO);
    let amount = (low + (high - low) * fraction).round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    amount.clamp(low, high)
}

/// Uniform amount in `(0, high]` at `scale` digits; `high` itself when the
/// draw truncates to zero
pub fn random_positive_up_to<R: Rng + ?Sized>(rng: &mut R, high: Decimal, scale: u32) -> Decimal {
    let amount = random_decimal_between(rng, Decimal::ZERO, high, scale);
    if amount.is_zero() {
        high
    } else {
        amount
    }
}

/// Uniform lot count in `[1, max]`
pub fn random_lots<R: Rng + ?Sized>(rng: &mut R, max: u64) -> u64 {
    rng.gen_range(1..=max.max(1))
}

/// Agents with free capacity sharing the lowest fee
pub fn lowest_fee_agents(agents: &[AgentInfo]) -> Vec<&AgentInfo> {
    let eligible: Vec<&AgentInfo> = agents.iter().filter(|agent| agent.has_capacity()).collect();
    let Some(lowest) = eligible.iter().map(|agent| agent.fee).min() else {
        return Vec::new();
    };
    eligible.into_iter().filter(|agent| agent.fee == lowest).collect()
}

pub fn choose<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    items.choose(rng)
}
