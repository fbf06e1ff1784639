//! Per-user flow state machine.
//!
//! `Idle -> Snapshotting -> Selecting -> Executing -> Verifying -> (loop)`,
//! ending in `Stopped` once the time budget runs out.

use fasset_flow_actions::{ActionError, ActionKind, ActionSettings, ExpectedState, StepContext, Verification};
use fasset_flow_protocol::CoreActions;
use fasset_flow_types::FlowState;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use futures::FutureExt;
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::error::{FlowError, Result};
use crate::report::{FlowReport, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Snapshotting,
    Selecting,
    Executing,
    Verifying,
    Stopped,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowPhase::Idle => "idle",
            FlowPhase::Snapshotting => "snapshotting",
            FlowPhase::Selecting => "selecting",
            FlowPhase::Executing => "executing",
            FlowPhase::Verifying => "verifying",
            FlowPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Configuration for one flow
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Native balance a user must exceed before any action is considered
    pub min_native_balance: Decimal,

    /// Tunables handed to every action
    pub action_settings: ActionSettings,

    /// Seed for action and amount selection; entropy when absent
    pub seed: Option<u64>,
}

impl FlowConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        let action_settings = ActionSettings::default();
        Self {
            min_native_balance: action_settings.native_reserve,
            action_settings,
            seed: None,
        }
    }
}

/// Builder for [`FlowOrchestrator`]
#[derive(Default)]
pub struct FlowOrchestratorBuilder {
    core: Option<Arc<dyn CoreActions>>,
    partner: Option<Arc<dyn CoreActions>>,
    config: FlowConfig,
}

impl FlowOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the acting user's capability set
    pub fn with_core(mut self, core: Arc<dyn CoreActions>) -> Self {
        self.core = Some(core);
        self
    }

    /// Set the partner receiving pool tokens in partner scenarios
    pub fn with_partner(mut self, partner: Arc<dyn CoreActions>) -> Self {
        self.partner = Some(partner);
        self
    }

    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<FlowOrchestrator> {
        let core = self.core.ok_or_else(|| FlowError::MissingField {
            field: "core".to_string(),
        })?;
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(FlowOrchestrator {
            core,
            partner: self.partner,
            config: self.config,
            rng,
            phase: FlowPhase::Idle,
        })
    }
}

/// Drives one user: snapshot, pick an eligible action, execute it and
/// verify the observed state against the prediction.
pub struct FlowOrchestrator {
    core: Arc<dyn CoreActions>,
    partner: Option<Arc<dyn CoreActions>>,
    config: FlowConfig,
    rng: StdRng,
    phase: FlowPhase,
}

impl FlowOrchestrator {
    pub fn builder() -> FlowOrchestratorBuilder {
        FlowOrchestratorBuilder::new()
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn user_name(&self) -> String {
        self.core.identity().name()
    }

    pub fn partner_name(&self) -> Option<String> {
        self.partner.as_ref().map(|partner| partner.identity().name())
    }

    /// Run steps until `total_time` is spent; forever when it is `None`.
    ///
    /// The budget is only checked between steps, so a long attestation wait
    /// inside a step can overrun it. An empty `actions` list means every
    /// registered action.
    pub async fn run(
        &mut self,
        actions: &[ActionKind],
        total_time: Option<Duration>,
        step_interval: Duration,
    ) -> FlowReport {
        let actions = if actions.is_empty() {
            ActionKind::ALL.to_vec()
        } else {
            actions.to_vec()
        };
        let mut report = FlowReport::default();
        let started = Instant::now();
        info!(
            actions = actions.len(),
            total_time = ?total_time,
            step_interval = ?step_interval,
            "Starting flow"
        );

        loop {
            if total_time.is_some_and(|total| started.elapsed() >= total) {
                break;
            }
            let outcome = self.step(&actions).await;
            report.record(outcome);
            info!(?outcome, successful = report.successful, total = report.total, "Step finished");

            sleep(step_interval).await;
            if let Some(total) = total_time {
                let left = total.saturating_sub(started.elapsed());
                info!(time_left = ?left, "Time left");
            }
        }

        self.phase = FlowPhase::Stopped;
        info!(
            successful = report.successful,
            total = report.total,
            "Flow finished. Successful steps: {}/{}",
            report.successful,
            report.total
        );
        report
    }

    /// One pass through the state machine. Never returns an error: failures
    /// are logged and reported as [`StepOutcome::Failed`].
    pub async fn step(&mut self, actions: &[ActionKind]) -> StepOutcome {
        let outcome = match AssertUnwindSafe(self.try_step(actions)).catch_unwind().await {
            Ok(result) => step_outcome(self.phase, result),
            Err(panic) => {
                error!(phase = %self.phase, reason = panic_reason(panic.as_ref()), "Step panicked");
                StepOutcome::Failed
            }
        };
        self.phase = FlowPhase::Idle;
        outcome
    }

    async fn try_step(&mut self, actions: &[ActionKind]) -> Result<StepOutcome> {
        self.phase = FlowPhase::Snapshotting;
        // fees of an earlier failed step must not leak into this prediction
        self.core.fee_tracker().reset();
        let state = self.core.flow_state().await?;
        let ctx = StepContext::load(self.core.as_ref(), state, self.config.action_settings.clone()).await?;

        self.phase = FlowPhase::Selecting;
        let eligible = self.eligible(&ctx, actions);
        let Some(kind) = eligible.choose(&mut self.rng).copied() else {
            info!(native = %ctx.native(), "No eligible actions");
            return Ok(StepOutcome::NoOp);
        };

        let partner = if kind.requires_partner() {
            match &self.partner {
                Some(partner) => {
                    partner.fee_tracker().reset();
                    Some((partner.clone(), partner.flow_state().await?))
                }
                None => return Err(ActionError::MissingPartner(kind).into()),
            }
        } else {
            None
        };

        self.phase = FlowPhase::Executing;
        info!(action = %kind, eligible = eligible.len(), "Executing action {kind}");
        let partner_core = partner.as_ref().map(|(core, _)| core.as_ref());
        let outcome = kind
            .execute(&ctx, self.core.as_ref(), partner_core, &mut self.rng)
            .await?;

        self.phase = FlowPhase::Verifying;
        let partner_state = partner.as_ref().map(|(_, state)| state);
        let expectations = outcome.expectations(&ctx, partner_state)?;

        let actual = self.core.flow_state().await?;
        let mut matched = check("user", &expectations.user, &actual);
        if let (Some(expected), Some((partner, _))) = (&expectations.partner, &partner) {
            let actual = partner.flow_state().await?;
            matched &= check("partner", expected, &actual);
        }

        if matched {
            info!(action = %kind, "Action verified");
            Ok(StepOutcome::Success)
        } else {
            warn!(action = %kind, "Observed state matches no prediction");
            Ok(StepOutcome::Failed)
        }
    }

    /// Actions whose own condition holds, provided the general native
    /// balance precondition does
    fn eligible(&self, ctx: &StepContext, actions: &[ActionKind]) -> Vec<ActionKind> {
        if ctx.native() <= self.config.min_native_balance {
            return Vec::new();
        }
        let has_partner = self.partner.is_some();
        actions
            .iter()
            .copied()
            .filter(|kind| kind.condition(ctx, has_partner))
            .collect()
    }
}

/// Actions recheck eligibility while they run; a refusal there is a no-op
fn step_outcome(phase: FlowPhase, result: Result<StepOutcome>) -> StepOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(FlowError::Action(ActionError::NotEligible { action, reason })) => {
            info!(%phase, action = %action, reason = %reason, "Action not eligible");
            StepOutcome::NoOp
        }
        Err(e) => {
            error!(%phase, error = %e, "Step failed");
            StepOutcome::Failed
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Verify one side and log every mismatched field of the closest candidate
fn check(side: &str, expected: &ExpectedState, actual: &FlowState) -> bool {
    let verification = expected.verify(actual);
    if let Verification::Mismatched(per_candidate) = &verification {
        for mismatch in verification.closest() {
            warn!(
                side,
                field = %mismatch.field,
                expected = %mismatch.expected,
                actual = %mismatch.actual,
                candidates = per_candidate.len(),
                "State mismatch"
            );
        }
    }
    verification.is_match()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_core() {
        let err = FlowOrchestrator::builder().build().err().unwrap();
        assert!(matches!(err, FlowError::MissingField { field } if field == "core"));
    }

    #[test]
    fn test_default_config_matches_action_reserve() {
        let config = FlowConfig::default().with_seed(9);
        assert_eq!(config.min_native_balance, Decimal::from(10));
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(FlowPhase::Verifying.to_string(), "verifying");
        assert_eq!(FlowPhase::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_refusal_during_execution_is_a_no_op() {
        let refused = ActionError::not_eligible(ActionKind::ExitRandomPoolRandomAmount, "nothing can leave any pool");
        assert_eq!(step_outcome(FlowPhase::Executing, Err(refused.into())), StepOutcome::NoOp);

        let missing = ActionError::MissingPartner(ActionKind::PartnerPoolTransferScenario);
        assert_eq!(step_outcome(FlowPhase::Selecting, Err(missing.into())), StepOutcome::Failed);
        assert_eq!(step_outcome(FlowPhase::Verifying, Ok(StepOutcome::Success)), StepOutcome::Success);
    }

    #[test]
    fn test_panic_reason_reads_message_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_reason(literal.as_ref()), "boom");
        let formatted: Box<dyn Any + Send> = Box::new(format!("bad {}", 7));
        assert_eq!(panic_reason(formatted.as_ref()), "bad 7");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_reason(other.as_ref()), "unknown panic");
    }
}
