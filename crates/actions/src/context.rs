use fasset_flow_protocol::CoreActions;
use fasset_flow_types::{AgentInfo, FlowState, PoolHolding, PoolInfo, Token, TokenSet};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

use crate::error::Result;

/// Tunables shared by every variant
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSettings {
    /// Native balance kept back from pool entries to pay for gas
    pub native_reserve: Decimal,

    /// Pause between minting and redeeming inside a scenario
    pub mint_redeem_delay: Duration,

    /// Pause before the partner acts on transferred pool tokens
    pub partner_transfer_delay: Duration,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            native_reserve: Decimal::from(10),
            mint_redeem_delay: Duration::from_secs(10),
            partner_transfer_delay: Duration::from_secs(5),
        }
    }
}

/// Everything a variant may consult before acting: the step snapshot plus
/// protocol parameters read alongside it.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub state: FlowState,
    pub tokens: TokenSet,
    pub lot_size: Decimal,
    pub agents: Vec<AgentInfo>,
    pub pools: Vec<PoolInfo>,
    pub min_pool_entry: Decimal,
    pub settings: ActionSettings,
}

impl StepContext {
    pub async fn load(core: &dyn CoreActions, state: FlowState, settings: ActionSettings) -> Result<Self> {
        let pools = core.pools().await?;
        let min_pool_entry = match pools.first() {
            Some(pool) => core.min_native_to_enter(&pool.address).await?,
            None => Decimal::ZERO,
        };
        Ok(Self {
            state,
            tokens: core.tokens().clone(),
            lot_size: core.lot_size().await?,
            agents: core.agents().await?,
            pools,
            min_pool_entry,
            settings,
        })
    }

    pub fn balance(&self, token: &Token) -> Decimal {
        self.state.balances().amount(token)
    }

    pub fn native(&self) -> Decimal {
        self.balance(&self.tokens.native)
    }

    pub fn underlying(&self) -> Decimal {
        self.balance(&self.tokens.underlying)
    }

    pub fn fasset(&self) -> Decimal {
        self.balance(&self.tokens.fasset)
    }

    /// Whole lots the underlying balance covers, ignoring the minting fee
    pub fn affordable_lots(&self) -> u64 {
        whole_lots(self.underlying(), self.lot_size)
    }

    /// Whole lots of fassets held
    pub fn redeemable_lots(&self) -> u64 {
        whole_lots(self.fasset(), self.lot_size)
    }

    /// Native that may go into a pool while keeping the gas reserve
    pub fn max_pool_entry(&self) -> Decimal {
        (self.native() - self.settings.native_reserve).max(Decimal::ZERO)
    }

    /// Smallest accepted pool entry, never below one native base unit
    pub fn min_pool_entry(&self) -> Decimal {
        self.min_pool_entry.max(self.tokens.native.tolerance())
    }

    pub fn pool_of_agent(&self, agent_vault: &str) -> Option<&PoolInfo> {
        self.pools.iter().find(|pool| pool.agent_vault == agent_vault)
    }

    pub fn pool_info(&self, pool_address: &str) -> Option<&PoolInfo> {
        self.pools.iter().find(|pool| pool.address == pool_address)
    }

    pub fn holding(&self, pool_address: &str) -> Option<&PoolHolding> {
        self.state.pool_holding(pool_address)
    }
}

fn whole_lots(amount: Decimal, lot_size: Decimal) -> u64 {
    if lot_size <= Decimal::ZERO || amount <= Decimal::ZERO {
        return 0;
    }
    (amount / lot_size).floor().to_u64().unwrap_or(0)
}
