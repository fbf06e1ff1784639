use fasset_flow_attestation::AttestationClient;
use fasset_flow_types::{FeeTracker, TokenSet, UserIdentity};
use std::sync::Arc;

use crate::contracts::{AssetManager, CollateralPools, NativeNetwork, TxReceipt, UnderlyingNetwork};
use crate::error::Result;

/// Executor address used when no executor is assigned
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Contract and chain clients bound to one identity
#[derive(Clone)]
pub struct ProtocolClients {
    pub asset_manager: Arc<dyn AssetManager>,
    pub pools: Arc<dyn CollateralPools>,
    pub native: Arc<dyn NativeNetwork>,
    pub underlying: Arc<dyn UnderlyingNetwork>,
}

/// Everything a user-side driver needs: who it acts as, which tokens it
/// sees, the clients to call, and where fees are accumulated.
pub struct UserContext {
    pub identity: UserIdentity,
    pub tokens: TokenSet,
    pub clients: ProtocolClients,
    pub attestation: Arc<AttestationClient>,
    pub fees: Arc<FeeTracker>,
}

impl UserContext {
    pub fn new(
        identity: UserIdentity,
        tokens: TokenSet,
        clients: ProtocolClients,
        attestation: Arc<AttestationClient>,
        fees: Arc<FeeTracker>,
    ) -> Self {
        Self {
            identity,
            tokens,
            clients,
            attestation,
            fees,
        }
    }

    /// Track the gas of a native write
    pub fn record_gas(&self, receipt: &TxReceipt) -> Result<()> {
        let gas = self.tokens.native.from_uba(receipt.gas_fee_wei)?;
        self.fees.record_native_gas(gas);
        Ok(())
    }

    /// Unix timestamp of the native chain, formatted for records
    pub async fn created_at(&self) -> Result<String> {
        let timestamp = self.clients.native.current_timestamp().await?;
        let timestamp = i64::try_from(timestamp).unwrap_or(i64::MAX);
        Ok(fasset_flow_types::timestamp_to_date(timestamp)?)
    }
}
