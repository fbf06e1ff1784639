//! Proof acquisition: prepare, submit, align with the voting round, poll

use fasset_flow_types::{FeeTracker, Token};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::encoding::{keccak256_text, pad_to_64_hex, to_utf8_hex_string, zero_bytes32};
use crate::error::{AttestationError, Result};
use crate::poll::PollPolicy;
use crate::traits::{AttestationHub, DataAvailabilityApi, VerifierApi};
use crate::types::{
    AttestationProof, BlockRange, NonPaymentProof, PaymentProof, PaymentRequestBody, RawProof,
    ReferencedPaymentNonexistenceRequestBody, RequestBody, TransactionLookup,
};

/// Stage of a single proof request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationStage {
    Preparing,
    Submitted,
    AwaitingRound,
    Polling,
    Proved,
    Failed,
}

impl fmt::Display for AttestationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttestationStage::Preparing => "preparing",
            AttestationStage::Submitted => "submitted",
            AttestationStage::AwaitingRound => "awaiting_round",
            AttestationStage::Polling => "polling",
            AttestationStage::Proved => "proved",
            AttestationStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// Name of the attested source chain, e.g. `testXRP`
    pub source_name: String,

    /// Waiting for the data-availability layer to reach a round
    pub round_poll: PollPolicy,

    /// Waiting for a proof to be published
    pub proof_poll: PollPolicy,

    /// Waiting for the verifier to index a transaction
    pub tx_lookup: PollPolicy,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            source_name: "testXRP".to_string(),
            round_poll: PollPolicy::round_default(),
            proof_poll: PollPolicy::proof_default(),
            tx_lookup: PollPolicy::tx_lookup_default(),
        }
    }
}

/// Builder for [`AttestationClient`]
pub struct AttestationClientBuilder {
    verifier: Option<Arc<dyn VerifierApi>>,
    data_availability: Option<Arc<dyn DataAvailabilityApi>>,
    hub: Option<Arc<dyn AttestationHub>>,
    config: AttestationConfig,
    native_token: Token,
    fees: Option<Arc<FeeTracker>>,
}

impl AttestationClientBuilder {
    pub fn new() -> Self {
        Self {
            verifier: None,
            data_availability: None,
            hub: None,
            config: AttestationConfig::default(),
            native_token: Token::c2flr(),
            fees: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn VerifierApi>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_data_availability(mut self, data_availability: Arc<dyn DataAvailabilityApi>) -> Self {
        self.data_availability = Some(data_availability);
        self
    }

    pub fn with_hub(mut self, hub: Arc<dyn AttestationHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_config(mut self, config: AttestationConfig) -> Self {
        self.config = config;
        self
    }

    /// Token the hub fee and gas are paid in
    pub fn with_native_token(mut self, token: Token) -> Self {
        self.native_token = token;
        self
    }

    /// Share the owning user's fee tracker
    pub fn with_fee_tracker(mut self, fees: Arc<FeeTracker>) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn build(self) -> Result<AttestationClient> {
        let verifier = self.verifier.ok_or_else(|| AttestationError::MissingField {
            field: "verifier".to_string(),
        })?;

        let data_availability = self.data_availability.ok_or_else(|| AttestationError::MissingField {
            field: "data_availability".to_string(),
        })?;

        let hub = self.hub.ok_or_else(|| AttestationError::MissingField {
            field: "hub".to_string(),
        })?;

        Ok(AttestationClient {
            verifier,
            data_availability,
            hub,
            source_id: to_utf8_hex_string(&self.config.source_name),
            config: self.config,
            native_token: self.native_token,
            fees: self.fees.unwrap_or_default(),
        })
    }
}

impl Default for AttestationClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Obtains payment and non-payment proofs for one user.
///
/// Every wait is bounded by the configured [`PollPolicy`]; exhausting one is
/// a hard error and nothing is retried beyond it.
pub struct AttestationClient {
    verifier: Arc<dyn VerifierApi>,
    data_availability: Arc<dyn DataAvailabilityApi>,
    hub: Arc<dyn AttestationHub>,
    config: AttestationConfig,
    source_id: String,
    native_token: Token,
    fees: Arc<FeeTracker>,
}

impl AttestationClient {
    pub fn builder() -> AttestationClientBuilder {
        AttestationClientBuilder::new()
    }

    pub fn config(&self) -> &AttestationConfig {
        &self.config
    }

    /// Encoded source id sent with every request
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn fee_tracker(&self) -> &Arc<FeeTracker> {
        &self.fees
    }

    /// Confirmed block window of the verifier's indexer
    pub async fn block_range(&self) -> Result<BlockRange> {
        self.verifier.block_range().await
    }

    /// Payment request body for an underlying transaction. Waits for the
    /// verifier to index the transaction.
    pub async fn payment_request_body(&self, tx_hash: &str) -> Result<PaymentRequestBody> {
        let policy = self.config.tx_lookup;
        for attempt in 1..=policy.max_attempts {
            match self.verifier.transaction(tx_hash).await {
                Ok(TransactionLookup::Found { transaction_id }) => {
                    return Ok(PaymentRequestBody::new(transaction_id));
                }
                Ok(TransactionLookup::NotFound) => {
                    debug!(tx_hash, attempt, "Transaction not indexed yet");
                }
                Err(e) => {
                    warn!(tx_hash, attempt, error = %e, "Transaction lookup failed");
                }
            }
            if attempt < policy.max_attempts {
                sleep(policy.interval).await;
            }
        }

        Err(AttestationError::TransactionNotFound {
            tx_hash: tx_hash.to_string(),
            attempts: policy.max_attempts,
        })
    }

    /// Request body proving that no payment carrying `reference` reached
    /// `destination` within the block window
    pub fn referenced_payment_nonexistence_request_body(
        &self,
        destination_address: &str,
        payment_reference: &str,
        amount_uba: u128,
        first_underlying_block: u64,
        last_underlying_block: u64,
        last_underlying_timestamp: u64,
    ) -> Result<ReferencedPaymentNonexistenceRequestBody> {
        Ok(ReferencedPaymentNonexistenceRequestBody {
            minimal_block_number: first_underlying_block.to_string(),
            deadline_block_number: last_underlying_block.to_string(),
            deadline_timestamp: last_underlying_timestamp.to_string(),
            destination_address_hash: keccak256_text(destination_address),
            amount: amount_uba.to_string(),
            standard_payment_reference: pad_to_64_hex(payment_reference)?,
            check_source_addresses: false,
            source_addresses_root: zero_bytes32(),
        })
    }

    /// ABI-encoded request for `body`; rejected bodies are errors
    pub async fn prepare(&self, body: &RequestBody) -> Result<String> {
        let attestation_type = body.attestation_type();
        let prepared = self
            .verifier
            .prepare_request(attestation_type, &self.source_id, body)
            .await?;

        match (prepared.status.as_str(), prepared.abi_encoded_request) {
            ("VALID", Some(abi)) => Ok(abi),
            (status, _) => Err(AttestationError::PrepareRejected {
                attestation_type: attestation_type.to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Pay the request fee and submit to the hub. Returns the voting round
    /// the submission falls in.
    pub async fn submit(&self, abi_encoded_request: &str) -> Result<u64> {
        let fee_wei = self.hub.request_fee(abi_encoded_request).await?;
        let submission = self.hub.request_attestation(abi_encoded_request, fee_wei).await?;

        self.fees
            .record_native_other(self.native_token.from_uba(fee_wei)?);
        self.fees
            .record_native_gas(self.native_token.from_uba(submission.gas_fee_wei)?);

        info!(
            tx_hash = %submission.tx_hash,
            block = submission.block_number,
            "Attestation request submitted"
        );

        self.hub.voting_round_id(submission.block_number).await
    }

    /// Wait until the data-availability layer has finalized `target`
    pub async fn wait_for_round(&self, target: u64) -> Result<()> {
        let mut backoff = self.config.round_poll.backoff();
        let mut latest = None;

        while let Some(delay) = backoff.next_delay() {
            sleep(delay).await;
            match self.data_availability.latest_voting_round().await {
                Ok(round) => {
                    debug!(round, target, attempt = backoff.current_attempt(), "Polled voting round");
                    latest = Some(round);
                    if round >= target {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(target, attempt = backoff.current_attempt(), error = %e, "Voting round read failed");
                }
            }
        }

        Err(AttestationError::RoundNotReached {
            target,
            latest,
            attempts: backoff.current_attempt(),
        })
    }

    /// Request the proof for `abi_encoded_request` until it is published
    pub async fn fetch_proof(&self, round: u64, abi_encoded_request: &str) -> Result<RawProof> {
        let mut backoff = self.config.proof_poll.backoff();

        while let Some(delay) = backoff.next_delay() {
            sleep(delay).await;
            match self
                .data_availability
                .proof_by_request_bytes(round, abi_encoded_request)
                .await
            {
                Ok(proof) if proof.is_ready() => return Ok(proof),
                Ok(_) => {
                    debug!(round, attempt = backoff.current_attempt(), "Proof not published yet");
                }
                Err(e) => {
                    warn!(round, attempt = backoff.current_attempt(), error = %e, "Proof request failed");
                }
            }
        }

        Err(AttestationError::ProofUnavailable {
            round,
            attempts: backoff.current_attempt(),
        })
    }

    /// Full protocol for one request body
    pub async fn get_proof(&self, body: &RequestBody) -> Result<RawProof> {
        let attestation_type = body.attestation_type();
        let result = self.run_stages(body).await;
        match &result {
            Ok(_) => info!(%attestation_type, stage = %AttestationStage::Proved, "Attestation stage"),
            Err(e) => warn!(%attestation_type, stage = %AttestationStage::Failed, error = %e, "Attestation stage"),
        }
        result
    }

    async fn run_stages(&self, body: &RequestBody) -> Result<RawProof> {
        let attestation_type = body.attestation_type();

        info!(%attestation_type, stage = %AttestationStage::Preparing, "Attestation stage");
        let abi = self.prepare(body).await?;

        let round = self.submit(&abi).await?;
        info!(%attestation_type, stage = %AttestationStage::Submitted, round, "Attestation stage");

        info!(%attestation_type, stage = %AttestationStage::AwaitingRound, round, "Attestation stage");
        self.wait_for_round(round).await?;

        info!(%attestation_type, stage = %AttestationStage::Polling, round, "Attestation stage");
        self.fetch_proof(round, &abi).await
    }

    /// Payment proof for an underlying transaction
    pub async fn prove_payment(&self, tx_hash: &str) -> Result<PaymentProof> {
        let body = self.payment_request_body(tx_hash).await?;
        let raw = self.get_proof(&RequestBody::Payment(body)).await?;
        typed_proof(raw)
    }

    /// Proof that a referenced payment never arrived
    pub async fn prove_referenced_payment_nonexistence(
        &self,
        destination_address: &str,
        payment_reference: &str,
        amount_uba: u128,
        first_underlying_block: u64,
        last_underlying_block: u64,
        last_underlying_timestamp: u64,
    ) -> Result<NonPaymentProof> {
        let body = self.referenced_payment_nonexistence_request_body(
            destination_address,
            payment_reference,
            amount_uba,
            first_underlying_block,
            last_underlying_block,
            last_underlying_timestamp,
        )?;
        let raw = self
            .get_proof(&RequestBody::ReferencedPaymentNonexistence(body))
            .await?;
        typed_proof(raw)
    }
}

fn typed_proof<Req, Resp>(raw: RawProof) -> Result<AttestationProof<Req, Resp>>
where
    Req: DeserializeOwned,
    Resp: DeserializeOwned,
{
    let response = raw.response.ok_or_else(|| AttestationError::MissingField {
        field: "response".to_string(),
    })?;
    Ok(AttestationProof {
        proof: raw.proof,
        response: serde_json::from_value(response)?,
    })
}
