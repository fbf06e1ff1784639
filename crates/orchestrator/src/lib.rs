//! Flow orchestration for FAsset QA runs
//!
//! A [`FlowOrchestrator`] drives one simulated user through random,
//! state-verified actions; a [`FlowRunner`] runs many of them side by side.

pub mod error;
pub mod flow;
pub mod report;
pub mod runner;

pub use error::{FlowError, Result};
pub use flow::{FlowConfig, FlowOrchestrator, FlowOrchestratorBuilder, FlowPhase};
pub use report::{FlowReport, RunReport, StepOutcome};
pub use runner::{FlowRunner, RunSettings};
