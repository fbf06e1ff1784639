//! The closed registry of action variants.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use fasset_flow_protocol::CoreActions;

use crate::context::StepContext;
use crate::error::{ActionError, Result};
use crate::outcome::ActionOutcome;
use crate::{mint, pool, redeem, scenario};

/// Every action a flow can pick from.
///
/// A variant is a name, a precondition over the step snapshot, an effect
/// driven through [`CoreActions`] and an expected-state function (see
/// [`ActionOutcome::expectations`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    MintLowestFeeAgentRandomAmount,
    MintRandomAgentRandomAmount,
    MintExecuteRandomMinting,
    RedeemRandomAmount,
    RedeemDefaultRandomRedemption,
    EnterRandomPoolRandomAmount,
    ExitRandomPoolRandomAmount,
    WithdrawPoolFeesRandomPool,
    /// Enter a pool, mint against its agent, redeem, exit and withdraw fees
    PoolMintRedeemScenario,
    /// Enter a pool and hand the tokens to the partner, who exits
    PartnerPoolTransferScenario,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::MintLowestFeeAgentRandomAmount,
        ActionKind::MintRandomAgentRandomAmount,
        ActionKind::MintExecuteRandomMinting,
        ActionKind::RedeemRandomAmount,
        ActionKind::RedeemDefaultRandomRedemption,
        ActionKind::EnterRandomPoolRandomAmount,
        ActionKind::ExitRandomPoolRandomAmount,
        ActionKind::WithdrawPoolFeesRandomPool,
        ActionKind::PoolMintRedeemScenario,
        ActionKind::PartnerPoolTransferScenario,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MintLowestFeeAgentRandomAmount => "MintLowestFeeAgentRandomAmount",
            ActionKind::MintRandomAgentRandomAmount => "MintRandomAgentRandomAmount",
            ActionKind::MintExecuteRandomMinting => "MintExecuteRandomMinting",
            ActionKind::RedeemRandomAmount => "RedeemRandomAmount",
            ActionKind::RedeemDefaultRandomRedemption => "RedeemDefaultRandomRedemption",
            ActionKind::EnterRandomPoolRandomAmount => "EnterRandomPoolRandomAmount",
            ActionKind::ExitRandomPoolRandomAmount => "ExitRandomPoolRandomAmount",
            ActionKind::WithdrawPoolFeesRandomPool => "WithdrawPoolFeesRandomPool",
            ActionKind::PoolMintRedeemScenario => "PoolMintRedeemScenario",
            ActionKind::PartnerPoolTransferScenario => "PartnerPoolTransferScenario",
        }
    }

    /// Variants that act on behalf of a partner identity as well
    pub fn requires_partner(&self) -> bool {
        matches!(self, ActionKind::PartnerPoolTransferScenario)
    }

    /// Whether the variant can run from the given snapshot
    pub fn condition(&self, ctx: &StepContext, has_partner: bool) -> bool {
        match self {
            ActionKind::MintLowestFeeAgentRandomAmount | ActionKind::MintRandomAgentRandomAmount => {
                mint::can_mint(ctx)
            }
            ActionKind::MintExecuteRandomMinting => mint::can_execute(ctx),
            ActionKind::RedeemRandomAmount => redeem::can_redeem(ctx),
            ActionKind::RedeemDefaultRandomRedemption => redeem::can_redeem_default(ctx),
            ActionKind::EnterRandomPoolRandomAmount => pool::can_enter(ctx),
            ActionKind::ExitRandomPoolRandomAmount => pool::can_exit(ctx),
            ActionKind::WithdrawPoolFeesRandomPool => pool::can_withdraw_fees(ctx),
            ActionKind::PoolMintRedeemScenario => scenario::can_pool_mint_redeem(ctx),
            ActionKind::PartnerPoolTransferScenario => has_partner && pool::can_enter(ctx),
        }
    }

    /// Run the variant's effect. Fees paid along the way are drained from
    /// the identities' trackers into the outcome.
    pub async fn execute(
        &self,
        ctx: &StepContext,
        core: &dyn CoreActions,
        partner: Option<&dyn CoreActions>,
        rng: &mut StdRng,
    ) -> Result<ActionOutcome> {
        match self {
            ActionKind::MintLowestFeeAgentRandomAmount => mint::mint_lowest_fee_agent(ctx, core, rng).await,
            ActionKind::MintRandomAgentRandomAmount => mint::mint_random_agent(ctx, core, rng).await,
            ActionKind::MintExecuteRandomMinting => mint::execute_random_minting(ctx, core, rng).await,
            ActionKind::RedeemRandomAmount => redeem::redeem_random_amount(ctx, core, rng).await,
            ActionKind::RedeemDefaultRandomRedemption => redeem::redeem_default_random(ctx, core, rng).await,
            ActionKind::EnterRandomPoolRandomAmount => pool::enter_random_pool(ctx, core, rng).await,
            ActionKind::ExitRandomPoolRandomAmount => pool::exit_random_pool(ctx, core, rng).await,
            ActionKind::WithdrawPoolFeesRandomPool => pool::withdraw_random_pool_fees(ctx, core, rng).await,
            ActionKind::PoolMintRedeemScenario => scenario::pool_mint_redeem(ctx, core, rng).await,
            ActionKind::PartnerPoolTransferScenario => {
                let partner = partner.ok_or(ActionError::MissingPartner(*self))?;
                scenario::partner_pool_transfer(ctx, core, partner, rng).await
            }
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        match name {
            "Scenario1" => return Ok(ActionKind::PoolMintRedeemScenario),
            "Scenario2" => return Ok(ActionKind::PartnerPoolTransferScenario),
            _ => {}
        }
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))
    }
}

/// Resolve configured action names into variants
pub fn parse_actions<S: AsRef<str>>(names: &[S]) -> Result<Vec<ActionKind>> {
    names.iter().map(|name| name.as_ref().parse()).collect()
}
