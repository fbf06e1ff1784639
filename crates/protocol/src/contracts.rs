//! Boundary of the contract and chain clients the drivers call into.
//!
//! Every client is bound to one signing identity; methods act on behalf of
//! that identity. Amounts are in smallest units (wei for native and pool
//! tokens, UBA for underlying and fasset).

use async_trait::async_trait;
use fasset_flow_attestation::{NonPaymentProof, PaymentProof};
use fasset_flow_types::RequestId;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Outcome of a native-chain write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_fee_wei: u128,
}

/// Agent as listed by the asset manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDetails {
    pub agent_vault: String,
    pub collateral_pool: String,
    pub free_collateral_lots: u64,
    pub fee_bips: u32,
}

/// CollateralReserved event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralReservation {
    pub reservation_id: RequestId,
    pub agent_vault: String,
    pub payment_address: String,
    pub value_uba: u128,
    pub fee_uba: u128,
    pub payment_reference: String,
    pub executor: String,
    /// Reservation fee paid in native on top of gas
    pub reservation_fee_wei: u128,
}

/// RedemptionRequested event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub request_id: RequestId,
    pub agent_vault: String,
    pub value_uba: u128,
    pub fee_uba: u128,
    pub payment_reference: String,
    pub first_underlying_block: u64,
    pub last_underlying_block: u64,
    pub last_underlying_timestamp: u64,
}

/// Result of a redeem call; `remaining_lots` comes from the
/// RedemptionRequestIncomplete event, zero when absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemOutcome {
    pub requests: Vec<RedemptionRequest>,
    pub remaining_lots: u64,
    pub receipt: TxReceipt,
}

/// On-chain redemption request status, in contract order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnChainRedemptionStatus {
    Active,
    DefaultedUnconfirmed,
    Successful,
    DefaultedFailed,
    Blocked,
    Rejected,
}

impl OnChainRedemptionStatus {
    pub fn from_index(index: u8) -> Result<Self> {
        use OnChainRedemptionStatus::*;
        [Active, DefaultedUnconfirmed, Successful, DefaultedFailed, Blocked, Rejected]
            .get(usize::from(index))
            .copied()
            .ok_or_else(|| ProtocolError::unknown("redemption status", index))
    }
}

/// Pool-wide totals in smallest units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTotals {
    pub total_collateral_wei: u128,
    pub total_pool_tokens_wei: u128,
    pub total_fasset_fees_uba: u128,
}

/// Underlying payment sent by this identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingPayment {
    pub tx_hash: String,
    pub amount_uba: u128,
    pub fee_uba: u128,
}

#[async_trait]
pub trait AssetManager: Send + Sync {
    async fn lot_size_uba(&self) -> Result<u128>;

    async fn asset_unit_uba(&self) -> Result<u128>;

    async fn redemption_fee_bips(&self) -> Result<u32>;

    async fn pool_token_timelock_seconds(&self) -> Result<u64>;

    /// Agents in index range `[start, end)`
    async fn available_agents(&self, start: usize, end: usize) -> Result<Vec<AgentDetails>>;

    async fn reserve_collateral(
        &self,
        agent_vault: &str,
        lots: u64,
        executor: &str,
    ) -> Result<(CollateralReservation, TxReceipt)>;

    async fn execute_minting(&self, proof: &PaymentProof, reservation_id: RequestId) -> Result<TxReceipt>;

    async fn redeem(&self, lots: u64, underlying_address: &str, executor: &str) -> Result<RedeemOutcome>;

    async fn redemption_request_status(&self, request_id: RequestId) -> Result<OnChainRedemptionStatus>;

    async fn redemption_payment_default(&self, proof: &NonPaymentProof, request_id: RequestId) -> Result<TxReceipt>;

    /// FAsset balance of this identity
    async fn fasset_balance(&self) -> Result<u128>;
}

#[async_trait]
pub trait CollateralPools: Send + Sync {
    async fn enter(&self, pool: &str, collateral_wei: u128) -> Result<TxReceipt>;

    async fn exit(&self, pool: &str, tokens_wei: u128) -> Result<TxReceipt>;

    async fn withdraw_fees(&self, pool: &str, fees_uba: u128) -> Result<TxReceipt>;

    async fn transfer_tokens(&self, pool: &str, to: &str, tokens_wei: u128) -> Result<TxReceipt>;

    async fn totals(&self, pool: &str) -> Result<PoolTotals>;

    async fn debt_free_tokens(&self, pool: &str) -> Result<u128>;

    async fn debt_locked_tokens(&self, pool: &str) -> Result<u128>;

    async fn fasset_fees(&self, pool: &str) -> Result<u128>;

    async fn min_nat_to_enter(&self, pool: &str) -> Result<u128>;

    async fn exit_collateral_ratio_bips(&self, pool: &str) -> Result<u32>;

    /// Value of the fassets the pool's agent backs, expressed in native wei
    async fn backed_value_wei(&self, pool: &str) -> Result<u128>;
}

#[async_trait]
pub trait NativeNetwork: Send + Sync {
    async fn balance(&self) -> Result<u128>;

    async fn current_timestamp(&self) -> Result<u64>;
}

#[async_trait]
pub trait UnderlyingNetwork: Send + Sync {
    async fn balance(&self) -> Result<u128>;

    async fn send_payment(&self, to: &str, amount_uba: u128, memo: &str) -> Result<UnderlyingPayment>;

    async fn current_block(&self) -> Result<u64>;

    async fn block_of_tx(&self, tx_hash: &str) -> Result<u64>;
}
