//! Persisted bookkeeping for open mint and redemption requests
//!
//! Records are written when a request is created and removed once it is
//! executed, defaulted or no longer active. Numeric fields are stored as
//! decimal strings so large smallest-unit amounts survive JSON round trips.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::status::RequestId;

/// Which request family a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Mint,
    Redeem,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Mint => write!(f, "mint"),
            RecordKind::Redeem => write!(f, "redeem"),
        }
    }
}

/// A record that can be stored keyed by its request id
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    fn request_id(&self) -> RequestId;
}

/// Open collateral reservation whose underlying payment has been sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRecord {
    #[serde(with = "as_string")]
    pub request_id: RequestId,
    pub payment_address: String,
    pub transaction_hash: String,
    pub executor_address: String,
    pub created_at: String,
    pub lots: u64,
}

impl StoredRecord for MintRecord {
    const KIND: RecordKind = RecordKind::Mint;

    fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// Open redemption request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRecord {
    #[serde(with = "as_string")]
    pub request_id: RequestId,
    /// Underlying amount the agent owes (value minus redemption fee)
    #[serde(rename = "amountUBA", with = "as_string")]
    pub amount_uba: u128,
    pub payment_reference: String,
    #[serde(with = "as_string")]
    pub first_underlying_block: u64,
    #[serde(with = "as_string")]
    pub last_underlying_block: u64,
    #[serde(with = "as_string")]
    pub last_underlying_timestamp: u64,
    pub executor_address: String,
    pub created_at: String,
    pub lots: u64,
}

impl StoredRecord for RedeemRecord {
    const KIND: RecordKind = RecordKind::Redeem;

    fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// Format a unix timestamp the way request records store creation time
pub fn timestamp_to_date(timestamp: i64) -> Result<String, TypesError> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| TypesError::InvalidRecord(format!("timestamp out of range: {timestamp}")))
}

mod as_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
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
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
