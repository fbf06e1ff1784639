use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AttestationType, BlockRange, PreparedRequest, RawProof, RequestBody, TransactionLookup};

/// Chain-specific verifier that indexes the underlying chain and prepares
/// ABI-encoded attestation requests
#[async_trait]
pub trait VerifierApi: Send + Sync {
    /// Look a transaction up in the verifier's indexer
    async fn transaction(&self, tx_hash: &str) -> Result<TransactionLookup>;

    /// Validate a request body and return its ABI encoding
    async fn prepare_request(
        &self,
        attestation_type: AttestationType,
        source_id: &str,
        body: &RequestBody,
    ) -> Result<PreparedRequest>;

    /// Confirmed block window of the indexer
    async fn block_range(&self) -> Result<BlockRange>;
}

/// Data-availability layer serving finalized voting rounds and proofs
#[async_trait]
pub trait DataAvailabilityApi: Send + Sync {
    /// Latest finalized attestation voting round
    async fn latest_voting_round(&self) -> Result<u64>;

    /// Proof for an ABI-encoded request in `voting_round`. An empty proof
    /// means the round has not been published yet.
    async fn proof_by_request_bytes(&self, voting_round: u64, request_bytes: &str) -> Result<RawProof>;
}

/// Result of submitting a request to the attestation hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSubmission {
    /// Native block the submission landed in
    pub block_number: u64,
    pub tx_hash: String,
    /// Gas paid for the submission, in wei
    pub gas_fee_wei: u128,
}

/// On-chain attestation hub the request is submitted to
#[async_trait]
pub trait AttestationHub: Send + Sync {
    /// Request fee in wei for an ABI-encoded request
    async fn request_fee(&self, abi_encoded_request: &str) -> Result<u128>;

    /// Submit a request paying `fee_wei`
    async fn request_attestation(&self, abi_encoded_request: &str, fee_wei: u128) -> Result<HubSubmission>;

    /// Voting round the given native block falls in
    async fn voting_round_id(&self, block_number: u64) -> Result<u64>;
}
