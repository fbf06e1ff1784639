use fasset_flow_attestation::unpad_0x;
use fasset_flow_types::{MintRecord, MintState, MintStatus, RequestId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::UserContext;
use crate::error::Result;
use crate::store::RecordStore;

/// Mint side of the protocol: reserve collateral, pay the agent on the
/// underlying chain, prove the payment and execute the minting.
pub struct Minter {
    ctx: Arc<UserContext>,
    store: Arc<dyn RecordStore<MintRecord>>,
}

impl Minter {
    pub fn new(ctx: Arc<UserContext>, store: Arc<dyn RecordStore<MintRecord>>) -> Self {
        Self { ctx, store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore<MintRecord>> {
        &self.store
    }

    /// Reserve `lots` at `agent_vault`, pay the underlying and persist the
    /// request. Returns the collateral reservation id.
    pub async fn reserve_and_pay(&self, agent_vault: &str, lots: u64, executor: &str) -> Result<RequestId> {
        let ctx = &self.ctx;
        info!(lots, agent_vault, "Reserving collateral");

        let (reservation, receipt) = ctx
            .clients
            .asset_manager
            .reserve_collateral(agent_vault, lots, executor)
            .await?;
        ctx.record_gas(&receipt)?;
        ctx.fees
            .record_native_other(ctx.tokens.native.from_uba(reservation.reservation_fee_wei)?);
        info!(reservation_id = reservation.reservation_id, "Collateral reserved");

        let payment = ctx
            .clients
            .underlying
            .send_payment(
                &reservation.payment_address,
                reservation.value_uba + reservation.fee_uba,
                unpad_0x(&reservation.payment_reference),
            )
            .await?;
        ctx.fees
            .record_underlying_gas(ctx.tokens.underlying.from_uba(payment.fee_uba)?);
        info!(
            tx_hash = %payment.tx_hash,
            amount = %ctx.tokens.underlying.from_uba(payment.amount_uba)?,
            "Paid underlying"
        );

        let record = MintRecord {
            request_id: reservation.reservation_id,
            payment_address: reservation.payment_address,
            transaction_hash: payment.tx_hash,
            executor_address: reservation.executor,
            created_at: ctx.created_at().await?,
            lots,
        };
        self.store.save(&record).await?;

        Ok(record.request_id)
    }

    /// Prove the stored payment of `reservation_id` and execute the minting
    pub async fn prove_and_execute(&self, reservation_id: RequestId) -> Result<()> {
        let ctx = &self.ctx;
        let record = self.store.require(reservation_id).await?;

        info!(reservation_id, tx_hash = %record.transaction_hash, "Getting payment proof");
        let proof = ctx.attestation.prove_payment(&record.transaction_hash).await?;

        let receipt = ctx
            .clients
            .asset_manager
            .execute_minting(&proof, reservation_id)
            .await?;
        ctx.record_gas(&receipt)?;
        info!(reservation_id, tx_hash = %receipt.tx_hash, "Minting executed");

        self.store.remove(reservation_id).await?;
        Ok(())
    }

    /// Stored requests split by whether their payment is still provable
    pub async fn mint_status(&self) -> Result<MintStatus> {
        let records = self.store.records().await?;
        let mut status = MintStatus::new();
        if records.is_empty() {
            return Ok(status);
        }

        let range = self.ctx.attestation.block_range().await?;
        for record in records {
            let block = self
                .ctx
                .clients
                .underlying
                .block_of_tx(&record.transaction_hash)
                .await?;
            let state = if block < range.first {
                MintState::Expired
            } else {
                MintState::Pending
            };
            debug!(request_id = record.request_id, block, ?state, "Mint request status");
            status.insert(state, record.request_id);
        }
        Ok(status)
    }

    /// Drop records whose payment can no longer be proven
    pub async fn remove_expired(&self, status: &MintStatus) -> Result<()> {
        for id in &status.expired {
            self.store.remove(*id).await?;
        }
        Ok(())
    }
}
