//! Runs one flow per user identity concurrently.

use fasset_flow_actions::ActionKind;
use futures::future::join_all;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};

use crate::flow::FlowOrchestrator;
use crate::report::{FlowReport, RunReport, StepOutcome};

/// Shared run parameters for every user flow
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub actions: Vec<ActionKind>,
    pub total_time: Option<Duration>,
    pub step_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            total_time: None,
            step_interval: Duration::from_secs(60),
        }
    }
}

pub struct FlowRunner {
    flows: Vec<FlowOrchestrator>,
    settings: RunSettings,
}

impl FlowRunner {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            flows: Vec::new(),
            settings,
        }
    }

    pub fn add_flow(&mut self, flow: FlowOrchestrator) {
        self.flows.push(flow);
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Spawn every flow as its own task and wait for all of them.
    ///
    /// A task that dies is reported as one failed step for its user; the
    /// other users' reports are kept.
    pub async fn run(self) -> RunReport {
        info!(users = self.flows.len(), "Starting user flows");
        let settings = self.settings;

        let handles: Vec<_> = self
            .flows
            .into_iter()
            .map(|mut flow| {
                let user = flow.user_name();
                let partner = flow.partner_name().unwrap_or_default();
                let span = info_span!("flow", user = %user, partner = %partner);
                let settings = settings.clone();
                let task = tokio::spawn(
                    async move {
                        flow.run(&settings.actions, settings.total_time, settings.step_interval)
                            .await
                    }
                    .instrument(span),
                );
                (user, task)
            })
            .collect();

        let (users, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let mut report = RunReport::default();
        for (user, result) in users.into_iter().zip(join_all(tasks).await) {
            match result {
                Ok(flow_report) => {
                    info!(user = %user, report = %flow_report, "User flow finished");
                    report.push(user, flow_report);
                }
                Err(e) => {
                    error!(user = %user, error = %e, "User flow task failed");
                    let mut failed = FlowReport::default();
                    failed.record(StepOutcome::Failed);
                    report.push(user, failed);
                }
            }
        }
        report
    }
}
