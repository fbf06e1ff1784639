//! Core types for the FAsset flow driver
//!
//! - Token identities with precision-derived comparison tolerances
//! - Balances, mint and redemption status sets, pool holdings
//! - `FlowState`, the per-step snapshot verified after every action
//! - `FeeTracker`, the per-user fee accumulator
//! - Persisted mint and redemption request records

pub mod agent;
pub mod balances;
pub mod error;
pub mod fees;
pub mod pool;
pub mod records;
pub mod state;
pub mod status;
pub mod token;
pub mod user;

pub use agent::*;
pub use balances::*;
pub use error::*;
pub use fees::*;
pub use pool::*;
pub use records::*;
pub use state::*;
pub use status::*;
pub use token::*;
pub use user::*;
