use fasset_flow_attestation::AttestationError;
use fasset_flow_types::{RecordKind, RequestId, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {kind} {id}")]
    NotFound { kind: RecordKind, id: RequestId },

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transaction {method} reverted: {reason}")]
    Reverted { method: String, reason: String },

    #[error("unknown {what}: {id}")]
    Unknown { what: String, id: String },

    #[error("insufficient {token} balance: need {needed}, have {available}")]
    InsufficientBalance {
        token: String,
        needed: u128,
        available: u128,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("arithmetic overflow in {0}")]
    Overflow(String),

    #[error(transparent)]
    Attestation(#[from] AttestationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl ProtocolError {
    pub fn reverted(method: &str, reason: impl Into<String>) -> Self {
        ProtocolError::Reverted {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unknown(what: &str, id: impl ToString) -> Self {
        ProtocolError::Unknown {
            what: what.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
