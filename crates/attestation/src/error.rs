use fasset_flow_types::TypesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("http request failed: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("transaction {tx_hash} not found by the verifier after {attempts} attempts")]
    TransactionNotFound { tx_hash: String, attempts: u32 },

    #[error("verifier rejected {attestation_type} request with status {status}")]
    PrepareRejected {
        attestation_type: String,
        status: String,
    },

    #[error("voting round {target} not reached after {attempts} attempts (latest seen: {latest:?})")]
    RoundNotReached {
        target: u64,
        latest: Option<u64>,
        attempts: u32,
    },

    #[error("proof for voting round {round} unavailable after {attempts} attempts")]
    ProofUnavailable { round: u64, attempts: u32 },

    #[error("attestation hub call failed: {0}")]
    Hub(String),

    #[error("invalid hex value: {0}")]
    InvalidHex(String),

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl From<reqwest::Error> for AttestationError {
    fn from(e: reqwest::Error) -> Self {
        AttestationError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for AttestationError {
    fn from(e: serde_json::Error) -> Self {
        AttestationError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AttestationError>;
