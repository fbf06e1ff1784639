//! Action variants a flow picks from at random.
//!
//! Every variant has four parts:
//! - a precondition over the step snapshot ([`ActionKind::condition`])
//! - an effect driven through `CoreActions` ([`ActionKind::execute`])
//! - an outcome carrying the values the effect read ([`ActionOutcome`])
//! - the expected post-state derived from the outcome ([`Expectations`])

pub mod context;
pub mod error;
pub mod expected;
pub mod kind;
pub mod math;
pub mod mint;
pub mod outcome;
pub mod pool;
pub mod redeem;
pub mod scenario;

pub use context::{ActionSettings, StepContext};
pub use error::{ActionError, Result};
pub use expected::{ExpectedState, Expectations, NewRedemption, Verification};
pub use kind::{parse_actions, ActionKind};
pub use outcome::ActionOutcome;
pub use scenario::{PartnerTransferRun, PoolMintRedeemRun};
