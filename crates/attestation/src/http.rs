//! REST clients for the verifier and data-availability services

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AttestationError, Result};
use crate::traits::{DataAvailabilityApi, VerifierApi};
use crate::types::{
    AttestationType, BlockRange, PrepareRequest, PreparedRequest, RawProof, RequestBody,
    TransactionLookup,
};

const API_KEY_HEADER: &str = "X-API-KEY";

/// Client whose every request gives up after `timeout`
fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Verifier REST client for one underlying chain
pub struct HttpVerifierClient {
    base_url: String,
    chain: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpVerifierClient {
    pub fn new(
        base_url: impl Into<String>,
        chain: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain: chain.into(),
            api_key: api_key.into(),
            timeout,
            client: http_client(timeout)?,
        })
    }

    /// Verifier for the XRP test chain
    pub fn xrp(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::new(base_url, "xrp", api_key, timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn indexer_url(&self, endpoint: &str) -> String {
        format!("{}/verifier/{}/api/indexer/{}", self.base_url, self.chain, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Querying verifier: {}", url);
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        decode(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionData {
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct BlockRangeData {
    first: u64,
    last: u64,
}

#[async_trait]
impl VerifierApi for HttpVerifierClient {
    async fn transaction(&self, tx_hash: &str) -> Result<TransactionLookup> {
        let url = self.indexer_url(&format!("transaction/{}", crate::encoding::unpad_0x(tx_hash)));
        let envelope: ApiEnvelope<TransactionData> = self.get_json(&url).await?;
        match (envelope.status.as_str(), envelope.data) {
            ("OK", Some(data)) => Ok(TransactionLookup::Found {
                transaction_id: data.transaction_id,
            }),
            _ => Ok(TransactionLookup::NotFound),
        }
    }

    async fn prepare_request(
        &self,
        attestation_type: AttestationType,
        source_id: &str,
        body: &RequestBody,
    ) -> Result<PreparedRequest> {
        let url = format!(
            "{}/verifier/{}/{}/prepareRequest",
            self.base_url, self.chain, attestation_type
        );
        let request = PrepareRequest {
            attestation_type: attestation_type.encoded(),
            source_id: source_id.to_string(),
            request_body: body.clone(),
        };

        debug!("Preparing {} request at {}", attestation_type, url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    async fn block_range(&self) -> Result<BlockRange> {
        let envelope: ApiEnvelope<BlockRangeData> = self.get_json(&self.indexer_url("block-range")).await?;
        let data = envelope.data.ok_or_else(|| AttestationError::MissingField {
            field: "data".to_string(),
        })?;
        Ok(BlockRange {
            first: data.first,
            last: data.last,
        })
    }
}

/// Data-availability REST client
pub struct HttpDataAvailabilityClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpDataAvailabilityClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            client: http_client(timeout)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Deserialize)]
struct FspStatus {
    latest_fdc: LatestRound,
}

#[derive(Debug, Deserialize)]
struct LatestRound {
    voting_round_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofRequest<'a> {
    voting_round_id: u64,
    request_bytes: &'a str,
}

#[async_trait]
impl DataAvailabilityApi for HttpDataAvailabilityClient {
    async fn latest_voting_round(&self) -> Result<u64> {
        let url = format!("{}/api/v0/fsp/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status: FspStatus = decode(response).await?;
        Ok(status.latest_fdc.voting_round_id)
    }

    async fn proof_by_request_bytes(&self, voting_round: u64, request_bytes: &str) -> Result<RawProof> {
        let url = format!("{}/api/v0/fdc/get-proof-round-id-bytes", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&ProofRequest {
                voting_round_id: voting_round,
                request_bytes,
            })
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("Attestation API error: {} - {}", status, body);
        return Err(AttestationError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| AttestationError::Decode(e.to_string()))
}
