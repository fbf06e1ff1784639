//! Minting variants

use fasset_flow_protocol::CoreActions;
use fasset_flow_types::{max_lots_available, AgentInfo, FeeTotals, RequestId};
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use tracing::info;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::expected::{allow_pool_fee_growth, ExpectedState};
use crate::kind::ActionKind;
use crate::math::{choose, lowest_fee_agents, random_lots};
use crate::outcome::ActionOutcome;

pub(crate) fn can_mint(ctx: &StepContext) -> bool {
    ctx.affordable_lots() >= 1 && max_lots_available(&ctx.agents) >= 1
}

pub(crate) fn can_execute(ctx: &StepContext) -> bool {
    !ctx.state.mint_status().pending.is_empty()
}

pub(crate) async fn mint_lowest_fee_agent(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let candidates: Vec<AgentInfo> = lowest_fee_agents(&ctx.agents).into_iter().cloned().collect();
    let agent = choose(rng, &candidates)
        .cloned()
        .ok_or_else(|| ActionError::not_eligible(ActionKind::MintLowestFeeAgentRandomAmount, "no agent has free lots"))?;
    mint_with(ctx, core, rng, agent, ActionKind::MintLowestFeeAgentRandomAmount).await
}

pub(crate) async fn mint_random_agent(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let candidates: Vec<AgentInfo> = ctx.agents.iter().filter(|a| a.has_capacity()).cloned().collect();
    let agent = choose(rng, &candidates)
        .cloned()
        .ok_or_else(|| ActionError::not_eligible(ActionKind::MintRandomAgentRandomAmount, "no agent has free lots"))?;
    mint_with(ctx, core, rng, agent, ActionKind::MintRandomAgentRandomAmount).await
}

async fn mint_with(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
    agent: AgentInfo,
    kind: ActionKind,
) -> Result<ActionOutcome> {
    let max = agent.max_lots.min(ctx.affordable_lots());
    if max == 0 {
        return Err(ActionError::not_eligible(kind, "underlying balance below one lot"));
    }
    let lots = random_lots(rng, max);
    info!(agent = %agent.address, fee = %agent.fee, lots, "Minting");

    core.mint(lots, &agent.address).await?;

    let pool = ctx.pool_of_agent(&agent.address).map(|pool| pool.address.clone());
    Ok(ActionOutcome::Minted {
        agent,
        pool,
        lots,
        paid: core.fee_tracker().drain(),
    })
}

pub(crate) async fn execute_random_minting(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let pending: Vec<RequestId> = ctx.state.mint_status().pending.iter().copied().collect();
    let id = *choose(rng, &pending)
        .ok_or_else(|| ActionError::not_eligible(ActionKind::MintExecuteRandomMinting, "no pending mints"))?;
    let record = core.mint_record(id).await?;
    info!(request_id = id, lots = record.lots, "Executing pending mint");

    core.mint_execute(id).await?;

    Ok(ActionOutcome::MintExecuted {
        id,
        lots: record.lots,
        paid: core.fee_tracker().drain(),
    })
}

/// Underlying leaves for the minted value plus the agent fee; fassets
/// arrive for the minted value. The minting fee may accrue to the user's
/// own holding in the agent's pool, or in any pool when that is unknown.
pub fn expected_mint(
    ctx: &StepContext,
    agent: &AgentInfo,
    pool: Option<&str>,
    lots: u64,
    paid: &FeeTotals,
) -> ExpectedState {
    let minted = Decimal::from(lots) * ctx.lot_size;
    let mut balances = ctx.state.balances().clone();
    balances.debit(&ctx.tokens.underlying, minted * (Decimal::ONE + agent.fee));
    balances.credit(&ctx.tokens.fasset, minted);
    balances.subtract_fee_totals(paid);
    allow_pool_fee_growth(ctx.state.with_balances(balances), pool.map(str::to_string))
}

/// The pending request resolves and its fassets arrive
pub fn expected_mint_execute(ctx: &StepContext, id: RequestId, lots: u64, paid: &FeeTotals) -> ExpectedState {
    let mut balances = ctx.state.balances().clone();
    balances.credit(&ctx.tokens.fasset, Decimal::from(lots) * ctx.lot_size);
    balances.subtract_fee_totals(paid);

    let mut mint_status = ctx.state.mint_status().clone();
    mint_status.pending.remove(&id);

    let reference = ctx.state.with_balances(balances).with_mint_status(mint_status);
    allow_pool_fee_growth(reference, None)
}
