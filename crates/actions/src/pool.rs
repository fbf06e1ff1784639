//! Collateral pool variants

use fasset_flow_protocol::CoreActions;
use fasset_flow_types::{FeeTotals, PoolHolding, PoolInfo};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::info;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::expected::ExpectedState;
use crate::kind::ActionKind;
use crate::math::{choose, random_decimal_between, random_positive_up_to};
use crate::outcome::ActionOutcome;

pub(crate) fn can_enter(ctx: &StepContext) -> bool {
    !ctx.pools.is_empty() && ctx.max_pool_entry() >= ctx.min_pool_entry()
}

pub(crate) fn can_exit(ctx: &StepContext) -> bool {
    !exitable(ctx).is_empty()
}

pub(crate) fn can_withdraw_fees(ctx: &StepContext) -> bool {
    !withdrawable(ctx).is_empty()
}

fn exitable(ctx: &StepContext) -> Vec<PoolHolding> {
    ctx.state
        .pool_holdings()
        .iter()
        .filter(|holding| holding.max_amount_to_exit.is_some_and(|max| max > Decimal::ZERO))
        .cloned()
        .collect()
}

fn withdrawable(ctx: &StepContext) -> Vec<PoolHolding> {
    ctx.state
        .pool_holdings()
        .iter()
        .filter(|holding| fee_units(ctx, holding.fasset_fees) >= 1)
        .cloned()
        .collect()
}

fn fee_units(ctx: &StepContext, fees: Decimal) -> u128 {
    ctx.tokens.fasset.to_uba(fees).unwrap_or(0)
}

/// Random entry amount between the pool minimum and `high`
pub(crate) fn entry_amount(ctx: &StepContext, rng: &mut StdRng, high: Decimal) -> Decimal {
    random_decimal_between(rng, ctx.min_pool_entry(), high, ctx.tokens.native.decimals())
}

/// Enter `pool` with `amount`, predicting the tokens from a stats read
/// taken right before the call. Returns the predicted tokens.
pub(crate) async fn enter(core: &dyn CoreActions, pool: &str, amount: Decimal) -> Result<Decimal> {
    let stats = core.pool_stats(pool).await?;
    let tokens = stats.collateral_to_tokens(amount);
    core.enter_pool(pool, amount).await?;
    Ok(tokens)
}

/// Exit `tokens` from `pool`, returning the collateral predicted from a
/// stats read taken right before the call
pub(crate) async fn exit(core: &dyn CoreActions, pool: &str, tokens: Decimal) -> Result<Decimal> {
    let stats = core.pool_stats(pool).await?;
    let collateral = stats.tokens_to_collateral(tokens);
    core.exit_pool(pool, tokens).await?;
    Ok(collateral)
}

pub(crate) async fn enter_random_pool(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let pool = choose(rng, &ctx.pools)
        .cloned()
        .ok_or_else(|| ActionError::not_eligible(ActionKind::EnterRandomPoolRandomAmount, "no pools"))?;
    let amount = entry_amount(ctx, rng, ctx.max_pool_entry());
    info!(pool = %pool.address, %amount, "Entering random pool");

    let tokens = enter(core, &pool.address, amount).await?;

    Ok(ActionOutcome::PoolEntered {
        pool,
        collateral: amount,
        tokens,
        paid: core.fee_tracker().drain(),
    })
}

pub(crate) async fn exit_random_pool(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let holdings = exitable(ctx);
    let holding = choose(rng, &holdings).ok_or_else(|| {
        ActionError::not_eligible(ActionKind::ExitRandomPoolRandomAmount, "nothing can leave any pool")
    })?;
    let max_exit = holding.max_amount_to_exit.unwrap_or(Decimal::ZERO);
    let high = holding.pool_tokens.min(max_exit);
    let tokens = random_positive_up_to(rng, high, ctx.tokens.native.decimals());
    info!(pool = %holding.pool_address, %tokens, "Exiting random pool");

    let collateral = exit(core, &holding.pool_address, tokens).await?;

    Ok(ActionOutcome::PoolExited {
        pool: holding.pool_address.clone(),
        tokens,
        collateral,
        paid: core.fee_tracker().drain(),
    })
}

pub(crate) async fn withdraw_random_pool_fees(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let holdings = withdrawable(ctx);
    let holding = choose(rng, &holdings).ok_or_else(|| {
        ActionError::not_eligible(ActionKind::WithdrawPoolFeesRandomPool, "no fees to withdraw")
    })?;
    let units = rng.gen_range(1..=fee_units(ctx, holding.fasset_fees));
    let fees = ctx.tokens.fasset.from_uba(units)?;
    info!(pool = %holding.pool_address, %fees, "Withdrawing pool fees");

    core.withdraw_pool_fees(&holding.pool_address, fees).await?;

    Ok(ActionOutcome::PoolFeesWithdrawn {
        pool: holding.pool_address.clone(),
        fees,
        paid: core.fee_tracker().drain(),
    })
}

/// Apply token and fee deltas to the holding in `pool`, creating it when
/// absent and dropping it once nothing is left
pub fn adjust_holding(
    holdings: &[PoolHolding],
    pool: &str,
    token_symbol: Option<&str>,
    token_delta: Decimal,
    fee_delta: Decimal,
) -> Vec<PoolHolding> {
    let mut adjusted: Vec<PoolHolding> = holdings.to_vec();
    let index = match adjusted.iter().position(|holding| holding.pool_address == pool) {
        Some(index) => index,
        None => {
            let mut holding = PoolHolding::new(pool, Decimal::ZERO, Decimal::ZERO);
            holding.token_symbol = token_symbol.map(str::to_string);
            adjusted.push(holding);
            adjusted.len() - 1
        }
    };
    let holding = &mut adjusted[index];
    holding.pool_tokens += token_delta;
    holding.fasset_fees += fee_delta;
    if holding.is_empty() {
        adjusted.remove(index);
    }
    adjusted
}

/// Native leaves for the collateral; the pool tokens join the holding
pub fn expected_enter(
    ctx: &StepContext,
    pool: &PoolInfo,
    collateral: Decimal,
    tokens: Decimal,
    paid: &FeeTotals,
) -> ExpectedState {
    let mut balances = ctx.state.balances().clone();
    balances.debit(&ctx.tokens.native, collateral);
    balances.subtract_fee_totals(paid);

    let holdings = adjust_holding(
        ctx.state.pool_holdings(),
        &pool.address,
        pool.token_symbol.as_deref(),
        tokens,
        Decimal::ZERO,
    );
    ExpectedState::exactly(ctx.state.with_balances(balances).with_pool_holdings(holdings))
}

/// Collateral returns for the burned tokens
pub fn expected_exit(
    ctx: &StepContext,
    pool: &str,
    tokens: Decimal,
    collateral: Decimal,
    paid: &FeeTotals,
) -> ExpectedState {
    let mut balances = ctx.state.balances().clone();
    balances.credit(&ctx.tokens.native, collateral);
    balances.subtract_fee_totals(paid);

    let holdings = adjust_holding(ctx.state.pool_holdings(), pool, None, -tokens, Decimal::ZERO);
    ExpectedState::exactly(ctx.state.with_balances(balances).with_pool_holdings(holdings))
}

/// Withdrawn fees move from the holding into the fasset balance
pub fn expected_withdraw_fees(ctx: &StepContext, pool: &str, fees: Decimal, paid: &FeeTotals) -> ExpectedState {
    let mut balances = ctx.state.balances().clone();
    balances.credit(&ctx.tokens.fasset, fees);
    balances.subtract_fee_totals(paid);

    let holdings = adjust_holding(ctx.state.pool_holdings(), pool, None, Decimal::ZERO, -fees);
    ExpectedState::exactly(ctx.state.with_balances(balances).with_pool_holdings(holdings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{balances, step_context};

    fn with_holding(ctx: &mut StepContext, holding: PoolHolding) {
        ctx.state = ctx.state.with_pool_holdings(vec![holding]);
    }

    #[test]
    fn test_enter_creates_holding() {
        let ctx = step_context(balances(50, 0, 0));
        let pool = ctx.pools[0].clone();
        let expected = expected_enter(&ctx, &pool, Decimal::from(15), Decimal::from(12), &FeeTotals::default());
        let reference = expected.reference().unwrap();
        assert_eq!(reference.balances().amount(&ctx.tokens.native), Decimal::from(35));
        assert_eq!(reference.pool_holding("0xpool0").unwrap().pool_tokens, Decimal::from(12));
    }

    #[test]
    fn test_full_exit_drops_holding() {
        let mut ctx = step_context(balances(50, 0, 0));
        with_holding(
            &mut ctx,
            PoolHolding::new("0xpool0", Decimal::from(12), Decimal::ZERO).with_max_amount_to_exit(Decimal::from(12)),
        );
        assert!(can_exit(&ctx));

        let expected = expected_exit(&ctx, "0xpool0", Decimal::from(12), Decimal::from(15), &FeeTotals::default());
        let reference = expected.reference().unwrap();
        assert!(reference.pool_holdings().is_empty());
        assert_eq!(reference.balances().amount(&ctx.tokens.native), Decimal::from(65));
    }

    #[test]
    fn test_exit_keeps_holding_with_fees() {
        let mut ctx = step_context(balances(50, 0, 0));
        with_holding(&mut ctx, PoolHolding::new("0xpool0", Decimal::from(12), Decimal::ONE));
        let expected = expected_exit(&ctx, "0xpool0", Decimal::from(12), Decimal::from(15), &FeeTotals::default());
        let holding = expected.reference().unwrap().pool_holding("0xpool0").cloned().unwrap();
        assert!(holding.pool_tokens.is_zero());
        assert_eq!(holding.fasset_fees, Decimal::ONE);
    }

    #[test]
    fn test_withdraw_moves_fees_to_balance() {
        let mut ctx = step_context(balances(50, 0, 0));
        with_holding(&mut ctx, PoolHolding::new("0xpool0", Decimal::from(3), Decimal::new(25, 1)));
        assert!(can_withdraw_fees(&ctx));

        let expected = expected_withdraw_fees(&ctx, "0xpool0", Decimal::ONE, &FeeTotals::default());
        let reference = expected.reference().unwrap();
        assert_eq!(reference.balances().amount(&ctx.tokens.fasset), Decimal::ONE);
        assert_eq!(
            reference.pool_holding("0xpool0").unwrap().fasset_fees,
            Decimal::new(15, 1)
        );
    }

    #[test]
    fn test_timelocked_holding_cannot_exit() {
        let mut ctx = step_context(balances(50, 0, 0));
        with_holding(
            &mut ctx,
            PoolHolding::new("0xpool0", Decimal::from(12), Decimal::ZERO).with_max_amount_to_exit(Decimal::ZERO),
        );
        assert!(!can_exit(&ctx));
        assert!(!can_withdraw_fees(&ctx));
    }

    #[test]
    fn test_enter_keeps_gas_reserve() {
        assert!(can_enter(&step_context(balances(11, 0, 0))));
        assert!(!can_enter(&step_context(balances(10, 0, 0))));
    }
}
