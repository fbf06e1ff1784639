use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single flow step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Executed and every observed state matched a prediction
    Success,
    /// Execution raised, or an observed state matched no prediction
    Failed,
    /// No action was eligible
    NoOp,
}

/// Step counters of one flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    pub successful: u64,
    pub failed: u64,
    pub no_ops: u64,
    pub total: u64,
}

impl FlowReport {
    pub fn record(&mut self, outcome: StepOutcome) {
        self.total += 1;
        match outcome {
            StepOutcome::Success => self.successful += 1,
            StepOutcome::Failed => self.failed += 1,
            StepOutcome::NoOp => self.no_ops += 1,
        }
    }

    pub fn merge(&mut self, other: &FlowReport) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.no_ops += other.no_ops;
        self.total += other.total;
    }

    /// Steps that ran an action
    pub fn executed(&self) -> u64 {
        self.successful + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} successful ({} failed, {} no-op)",
            self.successful, self.total, self.failed, self.no_ops
        )
    }
}

/// Per-user reports of a multi-user run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub users: Vec<(String, FlowReport)>,
}

impl RunReport {
    pub fn push(&mut self, user: impl Into<String>, report: FlowReport) {
        self.users.push((user.into(), report));
    }

    pub fn total(&self) -> FlowReport {
        let mut total = FlowReport::default();
        for (_, report) in &self.users {
            total.merge(report);
        }
        total
    }
}
