//! Redemption variants

use fasset_flow_protocol::CoreActions;
use fasset_flow_types::{FeeTotals, RedemptionState, RequestId};
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use tracing::info;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::expected::{redemptions_in_flight, ExpectedState, NewRedemption};
use crate::kind::ActionKind;
use crate::math::{choose, random_lots};
use crate::outcome::ActionOutcome;

pub(crate) fn can_redeem(ctx: &StepContext) -> bool {
    ctx.redeemable_lots() >= 1
}

pub(crate) fn can_redeem_default(ctx: &StepContext) -> bool {
    !ctx.state.redemption_status().default.is_empty()
}

/// Redeem `lots` and collect the requests it created
pub(crate) async fn redeem_lots(core: &dyn CoreActions, lots: u64) -> Result<(u64, Vec<NewRedemption>)> {
    let before = core.redemption_record_ids().await?;
    let remaining = core.redeem(lots).await?;
    let after = core.redemption_record_ids().await?;

    let mut redemptions = Vec::new();
    for id in after.difference(&before) {
        let record = core.redeem_record(*id).await?;
        redemptions.push(NewRedemption {
            id: *id,
            payout: core.tokens().underlying.from_uba(record.amount_uba)?,
        });
    }
    Ok((remaining, redemptions))
}

pub(crate) async fn redeem_random_amount(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let max = ctx.redeemable_lots();
    if max == 0 {
        return Err(ActionError::not_eligible(
            ActionKind::RedeemRandomAmount,
            "fasset balance below one lot",
        ));
    }
    let lots = random_lots(rng, max);
    info!(lots, "Redeeming");

    let (remaining_lots, redemptions) = redeem_lots(core, lots).await?;
    if remaining_lots > 0 {
        info!(remaining_lots, "Redemption partially fulfilled");
    }

    Ok(ActionOutcome::Redeemed {
        lots,
        remaining_lots,
        redemptions,
        paid: core.fee_tracker().drain(),
    })
}

pub(crate) async fn redeem_default_random(
    ctx: &StepContext,
    core: &dyn CoreActions,
    rng: &mut StdRng,
) -> Result<ActionOutcome> {
    let defaulted: Vec<RequestId> = ctx.state.redemption_status().default.iter().copied().collect();
    let id = *choose(rng, &defaulted).ok_or_else(|| {
        ActionError::not_eligible(ActionKind::RedeemDefaultRandomRedemption, "no defaulted redemptions")
    })?;
    let record = core.redeem_record(id).await?;
    let redemption_fee = core.redemption_fee().await?;
    info!(request_id = id, lots = record.lots, "Claiming redemption default");

    core.redeem_default(id).await?;

    Ok(ActionOutcome::DefaultRedeemed {
        id,
        lots: record.lots,
        redemption_fee,
        paid: core.fee_tracker().drain(),
    })
}

/// Fassets burn for the fulfilled lots. Each new request is pending or,
/// when its agent already paid, successful with the payout received.
pub fn expected_redeem(
    ctx: &StepContext,
    lots: u64,
    remaining_lots: u64,
    redemptions: &[NewRedemption],
    paid: &FeeTotals,
) -> ExpectedState {
    let redeemed = Decimal::from(lots.saturating_sub(remaining_lots)) * ctx.lot_size;
    let mut balances = ctx.state.balances().clone();
    balances.debit(&ctx.tokens.fasset, redeemed);
    balances.subtract_fee_totals(paid);

    redemptions_in_flight(
        ctx.state.with_balances(balances),
        ctx.tokens.underlying.clone(),
        redemptions.to_vec(),
        vec![RedemptionState::Pending, RedemptionState::Success],
    )
}

/// The default pays out the redeemed value less the redemption fee and
/// the request leaves the tracked set
pub fn expected_redeem_default(
    ctx: &StepContext,
    id: RequestId,
    lots: u64,
    redemption_fee: Decimal,
    paid: &FeeTotals,
) -> ExpectedState {
    let value = Decimal::from(lots) * ctx.lot_size;
    let mut balances = ctx.state.balances().clone();
    balances.credit(&ctx.tokens.underlying, value * (Decimal::ONE - redemption_fee));
    balances.subtract_fee_totals(paid);

    let mut status = ctx.state.redemption_status().clone();
    status.default.remove(&id);

    ExpectedState::exactly(ctx.state.with_balances(balances).with_redemption_status(status))
}
