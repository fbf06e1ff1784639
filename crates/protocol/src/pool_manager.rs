use fasset_flow_types::{bips_to_fraction, safe_exit_tokens, AgentInfo, PoolHolding, PoolInfo, PoolStats};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::UserContext;
use crate::contracts::{AgentDetails, AssetManager};
use crate::error::Result;

/// Page size when listing agents
pub const AGENT_CHUNK_SIZE: usize = 10;

/// Every available agent, read page by page until a short page
pub async fn fetch_agents(asset_manager: &dyn AssetManager, chunk_size: usize) -> Result<Vec<AgentDetails>> {
    let chunk_size = chunk_size.max(1);
    let mut agents = Vec::new();
    let mut start = 0;
    loop {
        let page = asset_manager.available_agents(start, start + chunk_size).await?;
        let len = page.len();
        agents.extend(page);
        if len < chunk_size {
            break;
        }
        start += len;
    }
    Ok(agents)
}

impl From<&AgentDetails> for AgentInfo {
    fn from(details: &AgentDetails) -> Self {
        AgentInfo::from_bips(details.agent_vault.clone(), details.free_collateral_lots, details.fee_bips)
    }
}

/// Collateral pool participation for one identity.
///
/// Pool tokens carry 18 decimals like the native token, so native
/// precision is used for both.
pub struct PoolManager {
    ctx: Arc<UserContext>,
}

impl PoolManager {
    pub fn new(ctx: Arc<UserContext>) -> Self {
        Self { ctx }
    }

    fn to_wei(&self, amount: Decimal) -> Result<u128> {
        Ok(self.ctx.tokens.native.to_uba(amount)?)
    }

    fn from_wei(&self, wei: u128) -> Result<Decimal> {
        Ok(self.ctx.tokens.native.from_uba(wei)?)
    }

    pub async fn agents(&self) -> Result<Vec<AgentInfo>> {
        let details = fetch_agents(self.ctx.clients.asset_manager.as_ref(), AGENT_CHUNK_SIZE).await?;
        Ok(details.iter().map(AgentInfo::from).collect())
    }

    pub async fn pools(&self) -> Result<Vec<PoolInfo>> {
        let details = fetch_agents(self.ctx.clients.asset_manager.as_ref(), AGENT_CHUNK_SIZE).await?;
        Ok(details
            .into_iter()
            .map(|agent| PoolInfo::new(agent.collateral_pool, agent.agent_vault))
            .collect())
    }

    /// Pool-wide totals in token units
    pub async fn pool_stats(&self, pool: &str) -> Result<PoolStats> {
        let totals = self.ctx.clients.pools.totals(pool).await?;
        Ok(PoolStats::new(
            self.from_wei(totals.total_collateral_wei)?,
            self.from_wei(totals.total_pool_tokens_wei)?,
            self.ctx.tokens.fasset.from_uba(totals.total_fasset_fees_uba)?,
        ))
    }

    pub async fn debt_free_tokens(&self, pool: &str) -> Result<Decimal> {
        self.from_wei(self.ctx.clients.pools.debt_free_tokens(pool).await?)
    }

    pub async fn fasset_fees(&self, pool: &str) -> Result<Decimal> {
        Ok(self
            .ctx
            .tokens
            .fasset
            .from_uba(self.ctx.clients.pools.fasset_fees(pool).await?)?)
    }

    pub async fn min_nat_to_enter(&self, pool: &str) -> Result<Decimal> {
        self.from_wei(self.ctx.clients.pools.min_nat_to_enter(pool).await?)
    }

    /// Largest exit that keeps the pool above its exit collateral ratio
    pub async fn safe_exit_amount(&self, pool: &str) -> Result<Decimal> {
        let pools = &self.ctx.clients.pools;
        let stats = self.pool_stats(pool).await?;
        let backed_value = self.from_wei(pools.backed_value_wei(pool).await?)?;
        let exit_cr = bips_to_fraction(pools.exit_collateral_ratio_bips(pool).await?);
        let debt_free = self.debt_free_tokens(pool).await?;
        Ok(safe_exit_tokens(&stats, backed_value, exit_cr, debt_free))
    }

    /// Holdings in every pool where this identity has tokens or fees
    pub async fn pool_holdings(&self) -> Result<Vec<PoolHolding>> {
        let pools = &self.ctx.clients.pools;
        let mut holdings = Vec::new();
        for pool in self.pools().await? {
            let tokens = pools.debt_free_tokens(&pool.address).await?
                + pools.debt_locked_tokens(&pool.address).await?;
            let fees = pools.fasset_fees(&pool.address).await?;
            if tokens == 0 && fees == 0 {
                continue;
            }
            let mut holding = PoolHolding::new(
                pool.address.clone(),
                self.from_wei(tokens)?,
                self.ctx.tokens.fasset.from_uba(fees)?,
            )
            .with_max_amount_to_exit(self.safe_exit_amount(&pool.address).await?);
            holding.token_symbol = pool.token_symbol.clone();
            debug!(pool = %pool.address, %holding, "Pool holding");
            holdings.push(holding);
        }
        Ok(holdings)
    }

    /// Deposit `amount` native collateral
    pub async fn enter(&self, pool: &str, amount: Decimal) -> Result<()> {
        info!(pool, %amount, "Entering pool");
        let receipt = self.ctx.clients.pools.enter(pool, self.to_wei(amount)?).await?;
        self.ctx.record_gas(&receipt)
    }

    /// Redeem `tokens` pool tokens for collateral
    pub async fn exit(&self, pool: &str, tokens: Decimal) -> Result<()> {
        info!(pool, %tokens, "Exiting pool");
        let receipt = self.ctx.clients.pools.exit(pool, self.to_wei(tokens)?).await?;
        self.ctx.record_gas(&receipt)
    }

    /// Withdraw accrued fasset fees
    pub async fn withdraw_fees(&self, pool: &str, fees: Decimal) -> Result<()> {
        info!(pool, %fees, "Withdrawing pool fees");
        let fees_uba = self.ctx.tokens.fasset.to_uba(fees)?;
        let receipt = self.ctx.clients.pools.withdraw_fees(pool, fees_uba).await?;
        self.ctx.record_gas(&receipt)
    }

    pub async fn transfer_tokens(&self, pool: &str, to: &str, tokens: Decimal) -> Result<()> {
        info!(pool, to, %tokens, "Transferring pool tokens");
        let receipt = self
            .ctx
            .clients
            .pools
            .transfer_tokens(pool, to, self.to_wei(tokens)?)
            .await?;
        self.ctx.record_gas(&receipt)
    }
}
