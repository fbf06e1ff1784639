//! Cross-chain attestation proofs for the FAsset flow driver
//!
//! A proof request moves through preparation at the verifier, fee-bearing
//! submission to the on-chain hub, alignment with the data-availability
//! layer's voting round, and proof polling. All waits are bounded.

pub mod client;
pub mod encoding;
pub mod error;
pub mod http;
pub mod mock;
pub mod poll;
pub mod traits;
pub mod types;

pub use client::*;
pub use encoding::*;
pub use error::*;
pub use http::*;
pub use poll::*;
pub use traits::*;
pub use types::*;
