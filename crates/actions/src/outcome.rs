use fasset_flow_types::{AgentInfo, FeeTotals, FlowState, PoolInfo, RequestId};
use rust_decimal::Decimal;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::expected::{Expectations, NewRedemption};
use crate::kind::ActionKind;
use crate::scenario::{PartnerTransferRun, PoolMintRedeemRun};
use crate::{mint, pool, redeem, scenario};

/// What an executed variant did, with the fees its identities paid.
///
/// Carries every value read during execution that the expected post-state
/// depends on, so [`ActionOutcome::expectations`] is a pure function of the
/// step context and the outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Minted {
        agent: AgentInfo,
        /// Collateral pool of the agent, when listed
        pool: Option<String>,
        lots: u64,
        paid: FeeTotals,
    },
    MintExecuted {
        id: RequestId,
        lots: u64,
        paid: FeeTotals,
    },
    Redeemed {
        lots: u64,
        remaining_lots: u64,
        redemptions: Vec<NewRedemption>,
        paid: FeeTotals,
    },
    DefaultRedeemed {
        id: RequestId,
        lots: u64,
        redemption_fee: Decimal,
        paid: FeeTotals,
    },
    PoolEntered {
        pool: PoolInfo,
        collateral: Decimal,
        tokens: Decimal,
        paid: FeeTotals,
    },
    PoolExited {
        pool: String,
        tokens: Decimal,
        collateral: Decimal,
        paid: FeeTotals,
    },
    PoolFeesWithdrawn {
        pool: String,
        fees: Decimal,
        paid: FeeTotals,
    },
    PoolMintRedeem(PoolMintRedeemRun),
    PartnerPoolTransfer(PartnerTransferRun),
}

impl ActionOutcome {
    /// Expected post-states given the pre-state in `ctx`. Partner outcomes
    /// also need the partner's pre-state.
    pub fn expectations(&self, ctx: &StepContext, partner_state: Option<&FlowState>) -> Result<Expectations> {
        let user = match self {
            ActionOutcome::Minted {
                agent,
                pool,
                lots,
                paid,
            } => mint::expected_mint(ctx, agent, pool.as_deref(), *lots, paid),
            ActionOutcome::MintExecuted { id, lots, paid } => mint::expected_mint_execute(ctx, *id, *lots, paid),
            ActionOutcome::Redeemed {
                lots,
                remaining_lots,
                redemptions,
                paid,
            } => redeem::expected_redeem(ctx, *lots, *remaining_lots, redemptions, paid),
            ActionOutcome::DefaultRedeemed {
                id,
                lots,
                redemption_fee,
                paid,
            } => redeem::expected_redeem_default(ctx, *id, *lots, *redemption_fee, paid),
            ActionOutcome::PoolEntered {
                pool,
                collateral,
                tokens,
                paid,
            } => pool::expected_enter(ctx, pool, *collateral, *tokens, paid),
            ActionOutcome::PoolExited {
                pool,
                tokens,
                collateral,
                paid,
            } => pool::expected_exit(ctx, pool, *tokens, *collateral, paid),
            ActionOutcome::PoolFeesWithdrawn { pool, fees, paid } => {
                pool::expected_withdraw_fees(ctx, pool, *fees, paid)
            }
            ActionOutcome::PoolMintRedeem(run) => scenario::expected_pool_mint_redeem(ctx, run),
            ActionOutcome::PartnerPoolTransfer(run) => {
                let partner_state =
                    partner_state.ok_or(ActionError::MissingPartner(ActionKind::PartnerPoolTransferScenario))?;
                let (user, partner) = scenario::expected_partner_transfer(ctx, partner_state, run);
                return Ok(Expectations::with_partner(user, partner));
            }
        };
        Ok(Expectations::user(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{balances, step_context};

    #[test]
    fn test_partner_outcome_needs_partner_state() {
        let ctx = step_context(balances(100, 0, 0));
        let outcome = ActionOutcome::PartnerPoolTransfer(PartnerTransferRun {
            pool: ctx.pools[0].clone(),
            collateral_in: Decimal::from(10),
            tokens: Decimal::from(10),
            transferred: Decimal::ZERO,
            partner_exit_tokens: Decimal::ZERO,
            partner_collateral: Decimal::ZERO,
            paid: FeeTotals::default(),
            partner_paid: FeeTotals::default(),
        });
        assert!(matches!(
            outcome.expectations(&ctx, None),
            Err(ActionError::MissingPartner(_))
        ));

        let partner_state = ctx.state.clone();
        let expectations = outcome.expectations(&ctx, Some(&partner_state)).unwrap();
        assert!(expectations.partner.is_some());
    }

    #[test]
    fn test_single_user_outcome_has_no_partner_expectation() {
        let ctx = step_context(balances(100, 0, 0));
        let outcome = ActionOutcome::PoolFeesWithdrawn {
            pool: "0xpool0".into(),
            fees: Decimal::ZERO,
            paid: FeeTotals::default(),
        };
        let expectations = outcome.expectations(&ctx, None).unwrap();
        assert!(expectations.partner.is_none());
        assert!(expectations.user.verify(&ctx.state).is_match());
    }
}
