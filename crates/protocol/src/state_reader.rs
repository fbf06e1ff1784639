use fasset_flow_types::Balances;
use std::sync::Arc;
use tracing::debug;

use crate::context::UserContext;
use crate::error::Result;

/// Live balance reads of one identity across all three tokens
pub struct StateReader {
    ctx: Arc<UserContext>,
}

impl StateReader {
    pub fn new(ctx: Arc<UserContext>) -> Self {
        Self { ctx }
    }

    pub async fn balances(&self) -> Result<Balances> {
        let ctx = &self.ctx;
        let native = ctx.clients.native.balance().await?;
        let underlying = ctx.clients.underlying.balance().await?;
        let fasset = ctx.clients.asset_manager.fasset_balance().await?;

        let balances = Balances::new()
            .with(ctx.tokens.native.clone(), ctx.tokens.native.from_uba(native)?)
            .with(ctx.tokens.underlying.clone(), ctx.tokens.underlying.from_uba(underlying)?)
            .with(ctx.tokens.fasset.clone(), ctx.tokens.fasset.from_uba(fasset)?);
        debug!(user = %ctx.identity, %balances, "Read balances");
        Ok(balances)
    }
}
