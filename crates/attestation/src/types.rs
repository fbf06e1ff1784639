//! Wire types of the verifier and data-availability APIs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::encoding::to_utf8_hex_string;

/// Attestation types used by minting and redemption defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttestationType {
    /// Inclusion of an underlying payment
    Payment,
    /// Absence of a referenced payment within a block window
    ReferencedPaymentNonexistence,
}

impl AttestationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationType::Payment => "Payment",
            AttestationType::ReferencedPaymentNonexistence => "ReferencedPaymentNonexistence",
        }
    }

    /// Hex-encoded form used in request envelopes
    pub fn encoded(&self) -> String {
        to_utf8_hex_string(self.as_str())
    }
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestBody {
    pub transaction_id: String,
    pub in_utxo: String,
    pub utxo: String,
}

impl PaymentRequestBody {
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            in_utxo: "0".to_string(),
            utxo: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponseBody {
    #[serde(with = "num_str")]
    pub block_number: u64,
    #[serde(with = "num_str")]
    pub block_timestamp: u64,
    pub source_address_hash: String,
    pub source_addresses_root: String,
    pub receiving_address_hash: String,
    pub intended_receiving_address_hash: String,
    #[serde(with = "num_str")]
    pub spent_amount: i128,
    #[serde(with = "num_str")]
    pub intended_spent_amount: i128,
    #[serde(with = "num_str")]
    pub received_amount: i128,
    #[serde(with = "num_str")]
    pub intended_received_amount: i128,
    pub standard_payment_reference: String,
    pub one_to_one: bool,
    #[serde(with = "num_str")]
    pub status: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedPaymentNonexistenceRequestBody {
    pub minimal_block_number: String,
    pub deadline_block_number: String,
    pub deadline_timestamp: String,
    pub destination_address_hash: String,
    pub amount: String,
    pub standard_payment_reference: String,
    pub check_source_addresses: bool,
    pub source_addresses_root: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedPaymentNonexistenceResponseBody {
    #[serde(with = "num_str")]
    pub minimal_block_timestamp: u64,
    #[serde(with = "num_str")]
    pub first_overflow_block_number: u64,
    #[serde(with = "num_str")]
    pub first_overflow_block_timestamp: u64,
}

/// Request body of either attestation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Payment(PaymentRequestBody),
    ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceRequestBody),
}

impl RequestBody {
    pub fn attestation_type(&self) -> AttestationType {
        match self {
            RequestBody::Payment(_) => AttestationType::Payment,
            RequestBody::ReferencedPaymentNonexistence(_) => {
                AttestationType::ReferencedPaymentNonexistence
            }
        }
    }
}

/// Envelope posted to the verifier's prepareRequest endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub attestation_type: String,
    pub source_id: String,
    pub request_body: RequestBody,
}

/// Verifier answer to prepareRequest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedRequest {
    pub status: String,
    #[serde(default)]
    pub abi_encoded_request: Option<String>,
}

impl PreparedRequest {
    pub fn valid(abi_encoded_request: impl Into<String>) -> Self {
        Self {
            status: "VALID".to_string(),
            abi_encoded_request: Some(abi_encoded_request.into()),
        }
    }
}

/// Verifier transaction lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLookup {
    Found { transaction_id: String },
    /// Not indexed yet, or unknown
    NotFound,
}

/// Confirmed block window of the verifier's indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub first: u64,
    pub last: u64,
}

/// Raw proof response from the data-availability layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProof {
    #[serde(default)]
    pub proof: Vec<String>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

impl RawProof {
    pub fn is_ready(&self) -> bool {
        !self.proof.is_empty()
    }
}

/// Attested response with its request and response bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse<Req, Resp> {
    pub attestation_type: String,
    pub source_id: String,
    #[serde(with = "num_str")]
    pub voting_round: u64,
    #[serde(with = "num_str")]
    pub lowest_used_timestamp: u64,
    pub request_body: Req,
    pub response_body: Resp,
}

/// Merkle proof plus the attested response, ready for an on-chain
/// verification call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationProof<Req, Resp> {
    pub proof: Vec<String>,
    pub response: AttestationResponse<Req, Resp>,
}

pub type PaymentProof = AttestationProof<PaymentRequestBody, PaymentResponseBody>;

pub type NonPaymentProof = AttestationProof<
    ReferencedPaymentNonexistenceRequestBody,
    ReferencedPaymentNonexistenceResponseBody,
>;

/// Numbers that the APIs send either as JSON numbers or as decimal strings
pub(crate) mod num_str {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let text = match raw {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(D::Error::custom(format!("expected number, got {other}"))),
        };
        text.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_request_body_shape() {
        let body = serde_json::to_value(PaymentRequestBody::new("abc")).unwrap();
        assert_eq!(body, json!({"transactionId": "abc", "inUtxo": "0", "utxo": "0"}));
    }

    #[test]
    fn test_prepare_request_envelope() {
        let request = PrepareRequest {
            attestation_type: AttestationType::Payment.encoded(),
            source_id: "0x01".to_string(),
            request_body: RequestBody::Payment(PaymentRequestBody::new("abc")),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requestBody"]["transactionId"], "abc");
        assert!(value["attestationType"].as_str().unwrap().starts_with("0x5061796d656e74"));
    }

    #[test]
    fn test_payment_proof_decodes_mixed_numbers() {
        let raw = json!({
            "proof": ["0x01"],
            "response": {
                "attestationType": "0x5061796d656e74",
                "sourceId": "0x7465737458525000",
                "votingRound": 812345,
                "lowestUsedTimestamp": "1700000000",
                "requestBody": {"transactionId": "0xabc", "inUtxo": "0", "utxo": "0"},
                "responseBody": {
                    "blockNumber": "100",
                    "blockTimestamp": 1700000000,
                    "sourceAddressHash": "0x1",
                    "sourceAddressesRoot": "0x2",
                    "receivingAddressHash": "0x3",
                    "intendedReceivingAddressHash": "0x3",
                    "spentAmount": "-10",
                    "intendedSpentAmount": "10",
                    "receivedAmount": "10",
                    "intendedReceivedAmount": "10",
                    "standardPaymentReference": "0x46",
                    "oneToOne": true,
                    "status": "0"
                }
            }
        });
        let proof: PaymentProof = serde_json::from_value(raw).unwrap();
        assert_eq!(proof.response.voting_round, 812345);
        assert_eq!(proof.response.response_body.block_number, 100);
        assert_eq!(proof.response.response_body.spent_amount, -10);
    }

    #[test]
    fn test_raw_proof_readiness() {
        assert!(!RawProof::default().is_ready());
        let ready = RawProof {
            proof: vec!["0x01".to_string()],
            response: None,
        };
        assert!(ready.is_ready());
    }
}
