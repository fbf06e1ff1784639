//! User-side FAsset protocol drivers
//!
//! - Boundary traits of the contract and chain clients, bound to one signer
//! - Record stores for open mint and redemption requests
//! - Minter, redeemer, pool manager and state reader for one identity
//! - `CoreActions`, the capability set action variants are written against
//! - An in-memory simulated network implementing every boundary trait

pub mod context;
pub mod contracts;
pub mod core_actions;
pub mod error;
pub mod minter;
pub mod pool_manager;
pub mod redeemer;
pub mod simulated;
pub mod state_reader;
pub mod store;

pub use core_actions::*;
pub use context::*;
pub use contracts::*;
pub use error::*;
pub use minter::*;
pub use pool_manager::*;
pub use redeemer::*;
pub use simulated::*;
pub use state_reader::*;
pub use store::*;
