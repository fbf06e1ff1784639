use fasset_flow_attestation::pad_0x;
use fasset_flow_types::{RedeemRecord, RedemptionState, RedemptionStatus, RequestId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::UserContext;
use crate::contracts::OnChainRedemptionStatus;
use crate::error::Result;
use crate::store::RecordStore;

/// Redemption side of the protocol
pub struct Redeemer {
    ctx: Arc<UserContext>,
    store: Arc<dyn RecordStore<RedeemRecord>>,
}

impl Redeemer {
    pub fn new(ctx: Arc<UserContext>, store: Arc<dyn RecordStore<RedeemRecord>>) -> Self {
        Self { ctx, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore<RedeemRecord>> {
        &self.store
    }

    /// Request redemption of `lots`. Every created request is persisted for
    /// a later default claim. Returns the lots left unredeemed.
    pub async fn redeem(&self, lots: u64, executor: &str) -> Result<u64> {
        let ctx = &self.ctx;
        info!(lots, "Starting redemption");

        let outcome = ctx
            .clients
            .asset_manager
            .redeem(lots, &ctx.identity.underlying_address, executor)
            .await?;
        ctx.record_gas(&outcome.receipt)?;
        info!(
            requests = outcome.requests.len(),
            remaining_lots = outcome.remaining_lots,
            "Redemption requested"
        );

        let lot_size = ctx.clients.asset_manager.lot_size_uba().await?;
        for request in outcome.requests {
            let record = RedeemRecord {
                request_id: request.request_id,
                amount_uba: request.value_uba.saturating_sub(request.fee_uba),
                payment_reference: pad_0x(&request.payment_reference),
                first_underlying_block: request.first_underlying_block,
                last_underlying_block: request.last_underlying_block,
                last_underlying_timestamp: request.last_underlying_timestamp,
                executor_address: executor.to_string(),
                created_at: ctx.created_at().await?,
                lots: u64::try_from(request.value_uba / lot_size.max(1)).unwrap_or(u64::MAX),
            };
            self.store.save(&record).await?;
        }

        Ok(outcome.remaining_lots)
    }

    /// Prove that the agent never paid and claim the default
    pub async fn redeem_default(&self, request_id: RequestId) -> Result<()> {
        let ctx = &self.ctx;
        let record = self.store.require(request_id).await?;

        info!(request_id, "Getting referenced payment nonexistence proof");
        let proof = ctx
            .attestation
            .prove_referenced_payment_nonexistence(
                &ctx.identity.underlying_address,
                &record.payment_reference,
                record.amount_uba,
                record.first_underlying_block,
                record.last_underlying_block,
                record.last_underlying_timestamp,
            )
            .await?;

        let receipt = ctx
            .clients
            .asset_manager
            .redemption_payment_default(&proof, request_id)
            .await?;
        ctx.record_gas(&receipt)?;
        info!(request_id, tx_hash = %receipt.tx_hash, "Redemption default executed");

        self.store.remove(request_id).await?;
        Ok(())
    }

    /// Classify every stored request
    pub async fn redemption_status(&self) -> Result<RedemptionStatus> {
        let records = self.store.records().await?;
        let mut result = RedemptionStatus::new();
        if records.is_empty() {
            return Ok(result);
        }

        let current_block = self.ctx.clients.underlying.current_block().await?;
        let first_block = self.ctx.attestation.block_range().await?.first;

        for record in records {
            let on_chain = self
                .ctx
                .clients
                .asset_manager
                .redemption_request_status(record.request_id)
                .await?;
            let state = classify(on_chain, &record, current_block, first_block);
            debug!(request_id = record.request_id, ?on_chain, ?state, "Redemption status");
            result.insert(state, record.request_id);
        }
        Ok(result)
    }

    /// Drop records of requests that can no longer change
    pub async fn remove_inactive(&self, status: &RedemptionStatus) -> Result<()> {
        for id in status.inactive_ids() {
            self.store.remove(id).await?;
        }
        Ok(())
    }
}

fn classify(
    on_chain: OnChainRedemptionStatus,
    record: &RedeemRecord,
    current_block: u64,
    first_indexed_block: u64,
) -> RedemptionState {
    match on_chain {
        OnChainRedemptionStatus::Active => {
            if current_block > record.last_underlying_block {
                RedemptionState::Default
            } else if record.last_underlying_block < first_indexed_block {
                RedemptionState::Expired
            } else {
                RedemptionState::Pending
            }
        }
        OnChainRedemptionStatus::Successful => RedemptionState::Success,
        _ => RedemptionState::Expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(last_block: u64) -> RedeemRecord {
        RedeemRecord {
            request_id: 1,
            amount_uba: 8_000_000,
            payment_reference: "0x01".to_string(),
            first_underlying_block: last_block.saturating_sub(10),
            last_underlying_block: last_block,
            last_underlying_timestamp: 0,
            executor_address: String::new(),
            created_at: String::new(),
            lots: 1,
        }
    }

    #[test]
    fn test_classify_active() {
        let r = record(100);
        assert_eq!(classify(OnChainRedemptionStatus::Active, &r, 101, 0), RedemptionState::Default);
        assert_eq!(classify(OnChainRedemptionStatus::Active, &r, 100, 0), RedemptionState::Pending);
        assert_eq!(classify(OnChainRedemptionStatus::Active, &r, 90, 150), RedemptionState::Expired);
    }

    #[test]
    fn test_classify_closed() {
        let r = record(100);
        assert_eq!(classify(OnChainRedemptionStatus::Successful, &r, 0, 0), RedemptionState::Success);
        for status in [
            OnChainRedemptionStatus::DefaultedUnconfirmed,
            OnChainRedemptionStatus::DefaultedFailed,
            OnChainRedemptionStatus::Blocked,
            OnChainRedemptionStatus::Rejected,
        ] {
            assert_eq!(classify(status, &r, 0, 0), RedemptionState::Expired);
        }
    }
}
