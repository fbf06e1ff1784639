//! In-memory doubles of the attestation services for testing

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AttestationError, Result};
use crate::traits::{AttestationHub, DataAvailabilityApi, HubSubmission, VerifierApi};
use crate::types::{
    AttestationType, BlockRange, PreparedRequest, RawProof, RequestBody, TransactionLookup,
};

#[derive(Debug)]
struct VerifierState {
    transactions: HashMap<String, String>,
    not_indexed_lookups: u32,
    prepare_status: String,
    block_range: BlockRange,
    lookup_calls: u32,
    prepare_calls: u32,
}

/// Mock verifier
pub struct MockVerifier {
    state: Arc<RwLock<VerifierState>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VerifierState {
                transactions: HashMap::new(),
                not_indexed_lookups: 0,
                prepare_status: "VALID".to_string(),
                block_range: BlockRange { first: 0, last: 1_000 },
                lookup_calls: 0,
                prepare_calls: 0,
            })),
        }
    }

    /// Make a transaction known to the indexer
    pub async fn add_transaction(&self, tx_hash: impl Into<String>, transaction_id: impl Into<String>) {
        self.state
            .write()
            .await
            .transactions
            .insert(tx_hash.into(), transaction_id.into());
    }

    /// Answer the next `count` lookups with "not found"
    pub async fn set_not_indexed_lookups(&self, count: u32) {
        self.state.write().await.not_indexed_lookups = count;
    }

    pub async fn set_prepare_status(&self, status: impl Into<String>) {
        self.state.write().await.prepare_status = status.into();
    }

    pub async fn set_block_range(&self, first: u64, last: u64) {
        self.state.write().await.block_range = BlockRange { first, last };
    }

    pub async fn lookup_calls(&self) -> u32 {
        self.state.read().await.lookup_calls
    }

    pub async fn prepare_calls(&self) -> u32 {
        self.state.read().await.prepare_calls
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerifierApi for MockVerifier {
    async fn transaction(&self, tx_hash: &str) -> Result<TransactionLookup> {
        let mut state = self.state.write().await;
        state.lookup_calls += 1;
        if state.not_indexed_lookups > 0 {
            state.not_indexed_lookups -= 1;
            return Ok(TransactionLookup::NotFound);
        }
        Ok(match state.transactions.get(tx_hash) {
            Some(id) => TransactionLookup::Found {
                transaction_id: id.clone(),
            },
            None => TransactionLookup::NotFound,
        })
    }

    async fn prepare_request(
        &self,
        attestation_type: AttestationType,
        _source_id: &str,
        _body: &RequestBody,
    ) -> Result<PreparedRequest> {
        let mut state = self.state.write().await;
        state.prepare_calls += 1;
        if state.prepare_status != "VALID" {
            return Ok(PreparedRequest {
                status: state.prepare_status.clone(),
                abi_encoded_request: None,
            });
        }
        Ok(PreparedRequest::valid(format!(
            "{}{:08x}",
            attestation_type.encoded(),
            state.prepare_calls
        )))
    }

    async fn block_range(&self) -> Result<BlockRange> {
        Ok(self.state.read().await.block_range)
    }
}

#[derive(Debug, Default)]
struct DataAvailabilityState {
    rounds: VecDeque<u64>,
    last_round: u64,
    failing_round_reads: u32,
    proof_ready_after: u32,
    proof_calls: u32,
    round_calls: u32,
    response: Option<serde_json::Value>,
}

/// Mock data-availability layer.
///
/// Rounds are served from a scripted sequence; once it runs out the last
/// value repeats. Proofs become non-empty after a configured number of calls.
pub struct MockDataAvailability {
    state: Arc<RwLock<DataAvailabilityState>>,
}

impl MockDataAvailability {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DataAvailabilityState::default())),
        }
    }

    pub async fn set_round_sequence(&self, rounds: impl IntoIterator<Item = u64>) {
        let mut state = self.state.write().await;
        state.rounds = rounds.into_iter().collect();
    }

    /// Fail the next `count` round reads with an HTTP error
    pub async fn set_failing_round_reads(&self, count: u32) {
        self.state.write().await.failing_round_reads = count;
    }

    /// Return an empty proof for the first `calls` requests
    pub async fn set_proof_ready_after(&self, calls: u32) {
        self.state.write().await.proof_ready_after = calls;
    }

    /// Attested response returned with every ready proof
    pub async fn set_response(&self, response: serde_json::Value) {
        self.state.write().await.response = Some(response);
    }

    pub async fn round_calls(&self) -> u32 {
        self.state.read().await.round_calls
    }

    pub async fn proof_calls(&self) -> u32 {
        self.state.read().await.proof_calls
    }
}

impl Default for MockDataAvailability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAvailabilityApi for MockDataAvailability {
    async fn latest_voting_round(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        state.round_calls += 1;
        if state.failing_round_reads > 0 {
            state.failing_round_reads -= 1;
            return Err(AttestationError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        if let Some(round) = state.rounds.pop_front() {
            state.last_round = round;
        }
        Ok(state.last_round)
    }

    async fn proof_by_request_bytes(&self, _voting_round: u64, _request_bytes: &str) -> Result<RawProof> {
        let mut state = self.state.write().await;
        state.proof_calls += 1;
        if state.proof_calls <= state.proof_ready_after {
            return Ok(RawProof::default());
        }
        Ok(RawProof {
            proof: vec![format!("0x{:064x}", state.proof_calls)],
            response: state.response.clone(),
        })
    }
}

#[derive(Debug)]
struct HubState {
    fee_wei: u128,
    gas_fee_wei: u128,
    block_number: u64,
    voting_round: u64,
    submissions: Vec<String>,
}

/// Mock attestation hub
pub struct MockHub {
    state: Arc<RwLock<HubState>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(HubState {
                fee_wei: 1_000_000_000_000_000,
                gas_fee_wei: 0,
                block_number: 100,
                voting_round: 1,
                submissions: Vec::new(),
            })),
        }
    }

    pub async fn set_fees(&self, fee_wei: u128, gas_fee_wei: u128) {
        let mut state = self.state.write().await;
        state.fee_wei = fee_wei;
        state.gas_fee_wei = gas_fee_wei;
    }

    /// Round every submission is mapped to
    pub async fn set_voting_round(&self, round: u64) {
        self.state.write().await.voting_round = round;
    }

    pub async fn submissions(&self) -> Vec<String> {
        self.state.read().await.submissions.clone()
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttestationHub for MockHub {
    async fn request_fee(&self, _abi_encoded_request: &str) -> Result<u128> {
        Ok(self.state.read().await.fee_wei)
    }

    async fn request_attestation(&self, abi_encoded_request: &str, fee_wei: u128) -> Result<HubSubmission> {
        let mut state = self.state.write().await;
        if fee_wei < state.fee_wei {
            return Err(AttestationError::Hub(format!(
                "fee {fee_wei} below required {}",
                state.fee_wei
            )));
        }
        state.block_number += 1;
        state.submissions.push(abi_encoded_request.to_string());
        Ok(HubSubmission {
            block_number: state.block_number,
            tx_hash: format!("0x{:064x}", state.block_number),
            gas_fee_wei: state.gas_fee_wei,
        })
    }

    async fn voting_round_id(&self, _block_number: u64) -> Result<u64> {
        Ok(self.state.read().await.voting_round)
    }
}
