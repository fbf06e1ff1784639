//! Multi-step scenarios.
//!
//! Each scenario reads everything it needs to predict its post-state while
//! it runs. Pool conversions always use a stats read taken right before the
//! call they describe.

use fasset_flow_protocol::CoreActions;
use fasset_flow_types::{AgentInfo, FeeTotals, FlowState, PoolInfo, RedemptionState};
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::expected::{redemptions_in_flight, ExpectedState, NewRedemption};
use crate::kind::ActionKind;
use crate::math::{choose, random_lots};
use crate::outcome::ActionOutcome;
use crate::pool::{adjust_holding, can_enter, enter, entry_amount, exit};
use crate::redeem::redeem_lots;

/// Slack added to the pool token timelock before relying on it
const TIMELOCK_MARGIN: Duration = Duration::from_secs(1);

/// What a pool-mint-redeem run did
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMintRedeemRun {
    pub pool: PoolInfo,
    pub agent: AgentInfo,
    pub collateral_in: Decimal,
    pub tokens: Decimal,
    pub lots: u64,
    pub remaining_lots: u64,
    pub redemptions: Vec<NewRedemption>,
    pub collateral_out: Decimal,
    pub fees_withdrawn: Decimal,
    pub paid: FeeTotals,
}

/// What a partner pool transfer run did
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerTransferRun {
    pub pool: PoolInfo,
    pub collateral_in: Decimal,
    pub tokens: Decimal,
    pub transferred: Decimal,
    pub partner_exit_tokens: Decimal,
    pub partner_collateral: Decimal,
    pub paid: FeeTotals,
    pub partner_paid: FeeTotals,
}

fn mintable_agents(ctx: &StepContext) -> Vec<(AgentInfo, PoolInfo)> {
    ctx.agents
        .iter()
        .filter(|agent| agent.has_capacity())
        .filter_map(|agent| ctx.pool_of_agent(&agent.address).map(|pool| (agent.clone(), pool.clone())))
        .collect()
}

pub(crate) fn can_pool_mint_redeem(ctx: &StepContext) -> bool {
    can_enter(ctx) && ctx.affordable_lots() >= 1 && !mintable_agents(ctx).is_empty()
}

/// Enter the pool of a random agent, mint against that agent, redeem the
/// minted lots, exit once the tokens unlock and withdraw every accrued fee.
pub(crate) async fn pool_mint_redeem(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let kind = ActionKind::PoolMintRedeemScenario;
    let candidates = mintable_agents(ctx);
    let (agent, pool) = choose(rng, &candidates)
        .cloned()
        .ok_or_else(|| ActionError::not_eligible(kind, "no agent with a known pool has free lots"))?;
    let max_lots = agent.max_lots.min(ctx.affordable_lots());
    if max_lots == 0 {
        return Err(ActionError::not_eligible(kind, "underlying balance below one lot"));
    }

    // leave native for the collateral reservation fee
    let high = (ctx.max_pool_entry() / Decimal::TWO).max(ctx.min_pool_entry());
    let collateral_in = entry_amount(ctx, rng, high);
    info!(pool = %pool.address, agent = %agent.address, amount = %collateral_in, "Scenario: entering agent pool");
    let tokens = enter(core, &pool.address, collateral_in).await?;

    let lots = random_lots(rng, max_lots);
    info!(lots, "Scenario: minting");
    core.mint(lots, &agent.address).await?;

    sleep(ctx.settings.mint_redeem_delay).await;
    info!(lots, "Scenario: redeeming");
    let (remaining_lots, redemptions) = redeem_lots(core, lots).await?;

    let timelock = core.pool_token_timelock().await?;
    info!(wait = ?(timelock + TIMELOCK_MARGIN), "Scenario: waiting for pool tokens to unlock");
    sleep(timelock + TIMELOCK_MARGIN).await;

    let collateral_out = exit(core, &pool.address, tokens).await?;

    let fees_withdrawn = core.fasset_fees(&pool.address).await?;
    if fees_withdrawn > Decimal::ZERO {
        core.withdraw_pool_fees(&pool.address, fees_withdrawn).await?;
    }
    info!(%collateral_out, fees = %fees_withdrawn, "Scenario: pool position closed");

    Ok(ActionOutcome::PoolMintRedeem(PoolMintRedeemRun {
        pool,
        agent,
        collateral_in,
        tokens,
        lots,
        remaining_lots,
        redemptions,
        collateral_out,
        fees_withdrawn,
        paid: core.fee_tracker().drain(),
    }))
}

/// Enter a random pool, hand the unlocked tokens to the partner and let the
/// partner exit what it safely can.
pub(crate) async fn partner_pool_transfer(
    ctx: &StepContext,
    core: &dyn CoreActions,
    partner: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let pool = choose(rng, &ctx.pools)
        .cloned()
        .ok_or_else(|| ActionError::not_eligible(ActionKind::PartnerPoolTransferScenario, "no pools"))?;
    let collateral_in = entry_amount(ctx, rng, ctx.max_pool_entry());
    info!(pool = %pool.address, amount = %collateral_in, partner = %partner.identity(), "Scenario: entering pool for partner");
    let tokens = enter(core, &pool.address, collateral_in).await?;

    let timelock = core.pool_token_timelock().await?;
    sleep(timelock + TIMELOCK_MARGIN).await;

    let debt_free = core.debt_free_tokens(&pool.address).await?;
    let mut transferred = Decimal::ZERO;
    let mut partner_exit_tokens = Decimal::ZERO;
    let mut partner_collateral = Decimal::ZERO;

    if debt_free.is_zero() {
        info!(pool = %pool.address, "Scenario: no debt-free pool tokens to transfer");
    } else {
        transferred = tokens.min(debt_free);
        core.transfer_pool_tokens(&pool.address, &partner.identity().native_address, transferred)
            .await?;

        sleep(ctx.settings.partner_transfer_delay).await;
        partner_exit_tokens = transferred.min(partner.max_exit_tokens(&pool.address).await?);
        if partner_exit_tokens > Decimal::ZERO {
            partner_collateral = exit(partner, &pool.address, partner_exit_tokens).await?;
        }
        info!(%transferred, exited = %partner_exit_tokens, "Scenario: partner handled transferred tokens");
    }

    Ok(ActionOutcome::PartnerPoolTransfer(PartnerTransferRun {
        pool,
        collateral_in,
        tokens,
        transferred,
        partner_exit_tokens,
        partner_collateral,
        paid: core.fee_tracker().drain(),
        partner_paid: partner.fee_tracker().drain(),
    }))
}

/// Net pool round trip plus minted-then-redeemed fassets. Redemptions may
/// still be pending, already paid or, with a slow agent, defaulted.
pub fn expected_pool_mint_redeem(ctx: &StepContext, run: &PoolMintRedeemRun) -> ExpectedState {
    let lot_size = ctx.lot_size;
    let minted = Decimal::from(run.lots) * lot_size;
    let redeemed = Decimal::from(run.lots.saturating_sub(run.remaining_lots)) * lot_size;

    let mut balances = ctx.state.balances().clone();
    balances.credit(&ctx.tokens.native, run.collateral_out - run.collateral_in);
    balances.debit(&ctx.tokens.underlying, minted * (Decimal::ONE + run.agent.fee));
    balances.credit(&ctx.tokens.fasset, minted - redeemed + run.fees_withdrawn);
    balances.subtract_fee_totals(&run.paid);

    let mut holdings = ctx.state.pool_holdings().to_vec();
    if let Some(holding) = holdings.iter_mut().find(|h| h.pool_address == run.pool.address) {
        holding.fasset_fees = Decimal::ZERO;
    }
    holdings.retain(|holding| !holding.is_empty());

    redemptions_in_flight(
        ctx.state.with_balances(balances).with_pool_holdings(holdings),
        ctx.tokens.underlying.clone(),
        run.redemptions.clone(),
        vec![
            RedemptionState::Pending,
            RedemptionState::Default,
            RedemptionState::Success,
        ],
    )
}

/// User keeps whatever was not transferred; the partner gains the collateral
/// of its exit and any tokens it could not exit.
pub fn expected_partner_transfer(
    ctx: &StepContext,
    partner_state: &FlowState,
    run: &PartnerTransferRun,
) -> (ExpectedState, ExpectedState) {
    let symbol = run.pool.token_symbol.as_deref();

    let mut balances = ctx.state.balances().clone();
    balances.debit(&ctx.tokens.native, run.collateral_in);
    balances.subtract_fee_totals(&run.paid);
    let holdings = adjust_holding(
        ctx.state.pool_holdings(),
        &run.pool.address,
        symbol,
        run.tokens - run.transferred,
        Decimal::ZERO,
    );
    let user = ctx.state.with_balances(balances).with_pool_holdings(holdings);

    let mut partner_balances = partner_state.balances().clone();
    partner_balances.credit(&ctx.tokens.native, run.partner_collateral);
    partner_balances.subtract_fee_totals(&run.partner_paid);
    let partner_holdings = adjust_holding(
        partner_state.pool_holdings(),
        &run.pool.address,
        symbol,
        run.transferred - run.partner_exit_tokens,
        Decimal::ZERO,
    );
    let partner = partner_state
        .with_balances(partner_balances)
        .with_pool_holdings(partner_holdings);

    (ExpectedState::exactly(user), ExpectedState::exactly(partner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{balances, step_context};
    use fasset_flow_types::{MintStatus, PoolHolding, RedemptionStatus};

    fn pool() -> PoolInfo {
        PoolInfo::new("0xpool0", "0xagent0")
    }

    #[test]
    fn test_pool_mint_redeem_round_trip() {
        let ctx = step_context(balances(100, 100, 0));
        let run = PoolMintRedeemRun {
            pool: pool(),
            agent: ctx.agents[0].clone(),
            collateral_in: Decimal::from(20),
            tokens: Decimal::from(20),
            lots: 2,
            remaining_lots: 0,
            redemptions: vec![NewRedemption {
                id: 3,
                payout: Decimal::new(196, 1),
            }],
            collateral_out: Decimal::from(20),
            fees_withdrawn: Decimal::new(8, 2),
            paid: FeeTotals::default(),
        };
        let expected = expected_pool_mint_redeem(&ctx, &run);
        let reference = expected.reference().unwrap().clone();
        assert_eq!(reference.balances().amount(&ctx.tokens.underlying), Decimal::new(798, 1));
        assert_eq!(reference.balances().amount(&ctx.tokens.fasset), Decimal::new(8, 2));
        assert!(reference.pool_holdings().is_empty());

        let mut paid_out = RedemptionStatus::new();
        paid_out.insert(RedemptionState::Success, 3);
        let mut settled_balances = reference.balances().clone();
        settled_balances.credit(&ctx.tokens.underlying, Decimal::new(196, 1));
        let settled = reference
            .with_redemption_status(paid_out)
            .with_balances(settled_balances);
        assert!(expected.verify(&settled).is_match());
    }

    #[test]
    fn test_partner_transfer_splits_tokens() {
        let mut ctx = step_context(balances(100, 0, 0));
        ctx.state = ctx
            .state
            .with_pool_holdings(vec![PoolHolding::new("0xpool0", Decimal::from(5), Decimal::ZERO)]);
        let partner_state = FlowState::new(balances(20, 0, 0), MintStatus::new(), RedemptionStatus::new(), vec![]);
        let run = PartnerTransferRun {
            pool: pool(),
            collateral_in: Decimal::from(30),
            tokens: Decimal::from(30),
            transferred: Decimal::from(30),
            partner_exit_tokens: Decimal::from(25),
            partner_collateral: Decimal::from(25),
            paid: FeeTotals::default(),
            partner_paid: FeeTotals::default(),
        };
        let (user, partner) = expected_partner_transfer(&ctx, &partner_state, &run);

        let user = user.reference().unwrap().clone();
        assert_eq!(user.balances().amount(&ctx.tokens.native), Decimal::from(70));
        assert_eq!(user.pool_holding("0xpool0").unwrap().pool_tokens, Decimal::from(5));

        let partner = partner.reference().unwrap().clone();
        assert_eq!(partner.balances().amount(&ctx.tokens.native), Decimal::from(45));
        assert_eq!(partner.pool_holding("0xpool0").unwrap().pool_tokens, Decimal::from(5));
    }

    #[test]
    fn test_scenario_needs_agent_with_pool() {
        let ctx = step_context(balances(100, 100, 0));
        assert!(can_pool_mint_redeem(&ctx));

        let mut orphaned = step_context(balances(100, 100, 0));
        orphaned.pools.clear();
        assert!(!can_pool_mint_redeem(&orphaned));
    }
}
