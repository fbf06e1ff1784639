//! The capability set action variants are written against.
//!
//! `CoreActions` bundles every read and write a variant needs for one
//! identity. [`ProtocolCoreActions`] drives the contract clients directly;
//! tests substitute their own implementations.

use async_trait::async_trait;
use fasset_flow_types::{
    bips_to_fraction, AgentInfo, Balances, FeeTracker, FlowState, MintRecord, MintStatus, PoolHolding, PoolInfo,
    PoolStats, RedeemRecord, RedemptionStatus, RequestId, TokenSet, UserIdentity,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::context::{UserContext, ZERO_ADDRESS};
use crate::error::Result;
use crate::minter::Minter;
use crate::pool_manager::PoolManager;
use crate::redeemer::Redeemer;
use crate::state_reader::StateReader;
use crate::store::{InMemoryRecordStore, JsonFileStore, RecordStore};

#[async_trait]
pub trait CoreActions: Send + Sync {
    fn identity(&self) -> &UserIdentity;

    fn tokens(&self) -> &TokenSet;

    /// Tracker every write of this identity records into
    fn fee_tracker(&self) -> &Arc<FeeTracker>;

    // ─── State reads ───────────────────────────────────────────────────────

    async fn balances(&self) -> Result<Balances>;

    async fn mint_status(&self) -> Result<MintStatus>;

    async fn redemption_status(&self) -> Result<RedemptionStatus>;

    async fn pool_holdings(&self) -> Result<Vec<PoolHolding>>;

    /// Fresh snapshot of everything a flow step verifies
    async fn flow_state(&self) -> Result<FlowState> {
        Ok(FlowState::new(
            self.balances().await?,
            self.mint_status().await?,
            self.redemption_status().await?,
            self.pool_holdings().await?,
        ))
    }

    async fn agents(&self) -> Result<Vec<AgentInfo>>;

    async fn pools(&self) -> Result<Vec<PoolInfo>>;

    // ─── Protocol parameters ───────────────────────────────────────────────

    /// Lot size in underlying units
    async fn lot_size(&self) -> Result<Decimal>;

    /// Redemption fee as a fraction of the redeemed value
    async fn redemption_fee(&self) -> Result<Decimal>;

    /// How long freshly entered pool tokens stay locked
    async fn pool_token_timelock(&self) -> Result<Duration>;

    async fn pool_stats(&self, pool: &str) -> Result<PoolStats>;

    async fn debt_free_tokens(&self, pool: &str) -> Result<Decimal>;

    async fn fasset_fees(&self, pool: &str) -> Result<Decimal>;

    /// Safe-exit amount of this identity's tokens in `pool`
    async fn max_exit_tokens(&self, pool: &str) -> Result<Decimal>;

    async fn min_native_to_enter(&self, pool: &str) -> Result<Decimal>;

    // ─── Stored requests ───────────────────────────────────────────────────

    async fn mint_record(&self, id: RequestId) -> Result<MintRecord>;

    async fn redeem_record(&self, id: RequestId) -> Result<RedeemRecord>;

    async fn redemption_record_ids(&self) -> Result<BTreeSet<RequestId>>;

    // ─── Actions ───────────────────────────────────────────────────────────

    /// Reserve, pay, prove and execute; returns the reservation id
    async fn mint(&self, lots: u64, agent_vault: &str) -> Result<RequestId>;

    /// Prove and execute a stored mint request
    async fn mint_execute(&self, id: RequestId) -> Result<()>;

    /// Returns the lots the protocol could not redeem
    async fn redeem(&self, lots: u64) -> Result<u64>;

    async fn redeem_default(&self, id: RequestId) -> Result<()>;

    async fn enter_pool(&self, pool: &str, amount: Decimal) -> Result<()>;

    async fn exit_pool(&self, pool: &str, tokens: Decimal) -> Result<()>;

    async fn withdraw_pool_fees(&self, pool: &str, fees: Decimal) -> Result<()>;

    async fn transfer_pool_tokens(&self, pool: &str, to: &str, tokens: Decimal) -> Result<()>;

    /// Forget requests that can no longer change state
    async fn remove_inactive_records(&self) -> Result<()>;
}

/// [`CoreActions`] backed by the contract and chain clients
pub struct ProtocolCoreActions {
    ctx: Arc<UserContext>,
    minter: Minter,
    redeemer: Redeemer,
    pools: PoolManager,
    state: StateReader,
    executor: String,
}

impl ProtocolCoreActions {
    pub fn new(
        ctx: Arc<UserContext>,
        mint_store: Arc<dyn RecordStore<MintRecord>>,
        redeem_store: Arc<dyn RecordStore<RedeemRecord>>,
    ) -> Self {
        Self {
            minter: Minter::new(ctx.clone(), mint_store),
            redeemer: Redeemer::new(ctx.clone(), redeem_store),
            pools: PoolManager::new(ctx.clone()),
            state: StateReader::new(ctx.clone()),
            executor: ZERO_ADDRESS.to_string(),
            ctx,
        }
    }

    /// Records kept as JSON files under `data_dir/{user}/`
    pub fn with_json_store(ctx: Arc<UserContext>, data_dir: impl AsRef<Path>) -> Self {
        let user = ctx.identity.name();
        let mint_store = Arc::new(JsonFileStore::<MintRecord>::new(data_dir.as_ref(), &user));
        let redeem_store = Arc::new(JsonFileStore::<RedeemRecord>::new(data_dir.as_ref(), &user));
        Self::new(ctx, mint_store, redeem_store)
    }

    pub fn in_memory(ctx: Arc<UserContext>) -> Self {
        Self::new(
            ctx,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryRecordStore::new()),
        )
    }

    pub fn with_executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = executor.into();
        self
    }

    pub fn context(&self) -> &Arc<UserContext> {
        &self.ctx
    }
}

#[async_trait]
impl CoreActions for ProtocolCoreActions {
    fn identity(&self) -> &UserIdentity {
        &self.ctx.identity
    }

    fn tokens(&self) -> &TokenSet {
        &self.ctx.tokens
    }

    fn fee_tracker(&self) -> &Arc<FeeTracker> {
        &self.ctx.fees
    }

    async fn balances(&self) -> Result<Balances> {
        self.state.balances().await
    }

    async fn mint_status(&self) -> Result<MintStatus> {
        self.minter.mint_status().await
    }

    async fn redemption_status(&self) -> Result<RedemptionStatus> {
        self.redeemer.redemption_status().await
    }

    async fn pool_holdings(&self) -> Result<Vec<PoolHolding>> {
        self.pools.pool_holdings().await
    }

    async fn agents(&self) -> Result<Vec<AgentInfo>> {
        self.pools.agents().await
    }

    async fn pools(&self) -> Result<Vec<PoolInfo>> {
        self.pools.pools().await
    }

    async fn lot_size(&self) -> Result<Decimal> {
        let lot_size = self.ctx.clients.asset_manager.lot_size_uba().await?;
        Ok(self.ctx.tokens.underlying.from_uba(lot_size)?)
    }

    async fn redemption_fee(&self) -> Result<Decimal> {
        let bips = self.ctx.clients.asset_manager.redemption_fee_bips().await?;
        Ok(bips_to_fraction(bips))
    }

    async fn pool_token_timelock(&self) -> Result<Duration> {
        let seconds = self
            .ctx
            .clients
            .asset_manager
            .pool_token_timelock_seconds()
            .await?;
        Ok(Duration::from_secs(seconds))
    }

    async fn pool_stats(&self, pool: &str) -> Result<PoolStats> {
        self.pools.pool_stats(pool).await
    }

    async fn debt_free_tokens(&self, pool: &str) -> Result<Decimal> {
        self.pools.debt_free_tokens(pool).await
    }

    async fn fasset_fees(&self, pool: &str) -> Result<Decimal> {
        self.pools.fasset_fees(pool).await
    }

    async fn max_exit_tokens(&self, pool: &str) -> Result<Decimal> {
        self.pools.safe_exit_amount(pool).await
    }

    async fn min_native_to_enter(&self, pool: &str) -> Result<Decimal> {
        self.pools.min_nat_to_enter(pool).await
    }

    async fn mint_record(&self, id: RequestId) -> Result<MintRecord> {
        Ok(self.minter.store().require(id).await?)
    }

    async fn redeem_record(&self, id: RequestId) -> Result<RedeemRecord> {
        Ok(self.redeemer.store().require(id).await?)
    }

    async fn redemption_record_ids(&self) -> Result<BTreeSet<RequestId>> {
        Ok(self.redeemer.store().ids().await?)
    }

    async fn mint(&self, lots: u64, agent_vault: &str) -> Result<RequestId> {
        let id = self.minter.reserve_and_pay(agent_vault, lots, &self.executor).await?;
        self.minter.prove_and_execute(id).await?;
        info!(user = %self.ctx.identity, reservation_id = id, lots, "Mint complete");
        Ok(id)
    }

    async fn mint_execute(&self, id: RequestId) -> Result<()> {
        self.minter.prove_and_execute(id).await
    }

    async fn redeem(&self, lots: u64) -> Result<u64> {
        self.redeemer.redeem(lots, &self.executor).await
    }

    async fn redeem_default(&self, id: RequestId) -> Result<()> {
        self.redeemer.redeem_default(id).await
    }

    async fn enter_pool(&self, pool: &str, amount: Decimal) -> Result<()> {
        self.pools.enter(pool, amount).await
    }

    async fn exit_pool(&self, pool: &str, tokens: Decimal) -> Result<()> {
        self.pools.exit(pool, tokens).await
    }

    async fn withdraw_pool_fees(&self, pool: &str, fees: Decimal) -> Result<()> {
        self.pools.withdraw_fees(pool, fees).await
    }

    async fn transfer_pool_tokens(&self, pool: &str, to: &str, tokens: Decimal) -> Result<()> {
        self.pools.transfer_tokens(pool, to, tokens).await
    }

    async fn remove_inactive_records(&self) -> Result<()> {
        let mint_status = self.minter.mint_status().await?;
        self.minter.remove_expired(&mint_status).await?;
        let redemption_status = self.redeemer.redemption_status().await?;
        self.redeemer.remove_inactive(&redemption_status).await
    }
}
