//! Flow orchestrator runs against the simulated network

use async_trait::async_trait;
use fasset_flow_actions::ActionKind;
use fasset_flow_attestation::AttestationConfig;
use fasset_flow_orchestrator::{FlowConfig, FlowOrchestrator, FlowPhase, FlowRunner, RunSettings, StepOutcome};
use fasset_flow_protocol::{
    AgentSetup, CoreActions, ProtocolCoreActions, Result, SimulatedNetwork, SimulationParams,
};
use fasset_flow_types::{
    AgentInfo, Balances, FeeTracker, MintRecord, MintStatus, PoolHolding, PoolInfo, PoolStats, RedeemRecord,
    RedemptionStatus, RequestId, TokenSet, UserIdentity,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WEI: u128 = 1_000_000_000_000_000_000;
const UBA: u128 = 1_000_000;

fn user(num: u32) -> UserIdentity {
    UserIdentity::new(num, false, format!("0xuser{num}"), format!("rUser{num}"))
}

fn partner(num: u32) -> UserIdentity {
    UserIdentity::new(num, true, format!("0xpartner{num}"), format!("rPartner{num}"))
}

async fn network() -> SimulatedNetwork {
    let network = SimulatedNetwork::new(SimulationParams::default());
    network.add_agent(AgentSetup::new(0, 100, 20)).await;
    network
}

fn core_for(network: &SimulatedNetwork, identity: &UserIdentity) -> ProtocolCoreActions {
    let ctx = network
        .user_context(identity, TokenSet::coston2_test_xrp(), AttestationConfig::default())
        .unwrap();
    ProtocolCoreActions::in_memory(ctx)
}

fn flow(core: Arc<dyn CoreActions>, partner: Option<Arc<dyn CoreActions>>) -> FlowOrchestrator {
    let mut builder = FlowOrchestrator::builder()
        .with_core(core)
        .with_config(FlowConfig::default().with_seed(7));
    if let Some(partner) = partner {
        builder = builder.with_partner(partner);
    }
    builder.build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_pool_entries_verify() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 0).await;
    let mut flow = flow(Arc::new(core_for(&network, &user(0))), None);

    let report = flow
        .run(
            &[ActionKind::EnterRandomPoolRandomAmount],
            Some(Duration::from_secs(180)),
            Duration::from_secs(60),
        )
        .await;

    assert_eq!(report.total, 3);
    assert_eq!(report.failed, 0);
    assert!(report.successful >= 1);
    assert_eq!(flow.phase(), FlowPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_low_native_balance_is_a_no_op() {
    let network = network().await;
    network.fund(&user(0), 5 * WEI, 1_000 * UBA).await;
    let mut flow = flow(Arc::new(core_for(&network, &user(0))), None);

    let outcome = flow.step(&ActionKind::ALL).await;
    assert_eq!(outcome, StepOutcome::NoOp);
    assert_eq!(flow.phase(), FlowPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_partner_action_without_partner_is_a_no_op() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 0).await;
    let mut flow = flow(Arc::new(core_for(&network, &user(0))), None);

    let outcome = flow.step(&[ActionKind::PartnerPoolTransferScenario]).await;
    assert_eq!(outcome, StepOutcome::NoOp);
}

#[tokio::test(start_paused = true)]
async fn test_reverted_execution_fails_the_step() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 1_000 * UBA).await;
    let core = Arc::new(core_for(&network, &user(0)));
    let mut flow = flow(core.clone(), None);

    network.fail_next_executions(1).await;
    let outcome = flow.step(&[ActionKind::MintRandomAgentRandomAmount]).await;
    assert_eq!(outcome, StepOutcome::Failed);

    // the flow carries on and the stranded request becomes executable
    let outcome = flow.step(&[ActionKind::MintExecuteRandomMinting]).await;
    assert_eq!(outcome, StepOutcome::Success);
    assert!(core.mint_status().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_partner_transfer_verifies_both_sides() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 0).await;
    network.fund(&partner(0), 100 * WEI, 0).await;
    let mut flow = flow(
        Arc::new(core_for(&network, &user(0))),
        Some(Arc::new(core_for(&network, &partner(0)))),
    );

    let outcome = flow.step(&[ActionKind::PartnerPoolTransferScenario]).await;
    assert_eq!(outcome, StepOutcome::Success);
}

#[tokio::test(start_paused = true)]
async fn test_runner_reports_every_user() {
    let network = network().await;
    let mut runner = FlowRunner::new(RunSettings {
        actions: vec![ActionKind::EnterRandomPoolRandomAmount],
        total_time: Some(Duration::from_secs(120)),
        step_interval: Duration::from_secs(60),
    });
    for num in 0..3 {
        network.fund(&user(num), 500 * WEI, 0).await;
        runner.add_flow(flow(Arc::new(core_for(&network, &user(num))), None));
    }

    let report = runner.run().await;
    assert_eq!(report.users.len(), 3);
    assert_eq!(report.users[1].0, "user_1");
    assert_eq!(report.total().total, 6);
    assert_eq!(report.total().failed, 0);
}

#[derive(Clone, Copy)]
enum Fault {
    /// Lose one native unit from the reported balance after every pool entry
    Drift,
    /// Panic instead of entering a pool
    Panic,
}

/// Real core with one injected fault
struct FaultyCore {
    inner: ProtocolCoreActions,
    fault: Fault,
    drift: Mutex<Decimal>,
}

impl FaultyCore {
    fn new(inner: ProtocolCoreActions, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            drift: Mutex::new(Decimal::ZERO),
        }
    }
}

#[async_trait]
impl CoreActions for FaultyCore {
    fn identity(&self) -> &UserIdentity {
        self.inner.identity()
    }

    fn tokens(&self) -> &TokenSet {
        self.inner.tokens()
    }

    fn fee_tracker(&self) -> &Arc<FeeTracker> {
        self.inner.fee_tracker()
    }

    async fn balances(&self) -> Result<Balances> {
        let mut balances = self.inner.balances().await?;
        let drift = *self.drift.lock().unwrap();
        balances.debit(&self.tokens().native, drift);
        Ok(balances)
    }

    async fn mint_status(&self) -> Result<MintStatus> {
        self.inner.mint_status().await
    }

    async fn redemption_status(&self) -> Result<RedemptionStatus> {
        self.inner.redemption_status().await
    }

    async fn pool_holdings(&self) -> Result<Vec<PoolHolding>> {
        self.inner.pool_holdings().await
    }

    async fn agents(&self) -> Result<Vec<AgentInfo>> {
        self.inner.agents().await
    }

    async fn pools(&self) -> Result<Vec<PoolInfo>> {
        self.inner.pools().await
    }

    async fn lot_size(&self) -> Result<Decimal> {
        self.inner.lot_size().await
    }

    async fn redemption_fee(&self) -> Result<Decimal> {
        self.inner.redemption_fee().await
    }

    async fn pool_token_timelock(&self) -> Result<Duration> {
        self.inner.pool_token_timelock().await
    }

    async fn pool_stats(&self, pool: &str) -> Result<PoolStats> {
        self.inner.pool_stats(pool).await
    }

    async fn debt_free_tokens(&self, pool: &str) -> Result<Decimal> {
        self.inner.debt_free_tokens(pool).await
    }

    async fn fasset_fees(&self, pool: &str) -> Result<Decimal> {
        self.inner.fasset_fees(pool).await
    }

    async fn max_exit_tokens(&self, pool: &str) -> Result<Decimal> {
        self.inner.max_exit_tokens(pool).await
    }

    async fn min_native_to_enter(&self, pool: &str) -> Result<Decimal> {
        self.inner.min_native_to_enter(pool).await
    }

    async fn mint_record(&self, id: RequestId) -> Result<MintRecord> {
        self.inner.mint_record(id).await
    }

    async fn redeem_record(&self, id: RequestId) -> Result<RedeemRecord> {
        self.inner.redeem_record(id).await
    }

    async fn redemption_record_ids(&self) -> Result<BTreeSet<RequestId>> {
        self.inner.redemption_record_ids().await
    }

    async fn mint(&self, lots: u64, agent_vault: &str) -> Result<RequestId> {
        self.inner.mint(lots, agent_vault).await
    }

    async fn mint_execute(&self, id: RequestId) -> Result<()> {
        self.inner.mint_execute(id).await
    }

    async fn redeem(&self, lots: u64) -> Result<u64> {
        self.inner.redeem(lots).await
    }

    async fn redeem_default(&self, id: RequestId) -> Result<()> {
        self.inner.redeem_default(id).await
    }

    async fn enter_pool(&self, pool: &str, amount: Decimal) -> Result<()> {
        if let Fault::Panic = self.fault {
            panic!("pool entry for {} blew up", self.identity().name());
        }
        self.inner.enter_pool(pool, amount).await?;
        *self.drift.lock().unwrap() += Decimal::ONE;
        Ok(())
    }

    async fn exit_pool(&self, pool: &str, tokens: Decimal) -> Result<()> {
        self.inner.exit_pool(pool, tokens).await
    }

    async fn withdraw_pool_fees(&self, pool: &str, fees: Decimal) -> Result<()> {
        self.inner.withdraw_pool_fees(pool, fees).await
    }

    async fn transfer_pool_tokens(&self, pool: &str, to: &str, tokens: Decimal) -> Result<()> {
        self.inner.transfer_pool_tokens(pool, to, tokens).await
    }

    async fn remove_inactive_records(&self) -> Result<()> {
        self.inner.remove_inactive_records().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_unexplained_balance_change_is_a_mismatch() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 0).await;
    let core = FaultyCore::new(core_for(&network, &user(0)), Fault::Drift);
    let mut flow = flow(Arc::new(core), None);

    let outcome = flow.step(&[ActionKind::EnterRandomPoolRandomAmount]).await;
    assert_eq!(outcome, StepOutcome::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_step_fails_and_the_flow_continues() {
    let network = network().await;
    network.fund(&user(0), 1_000 * WEI, 0).await;
    let core = FaultyCore::new(core_for(&network, &user(0)), Fault::Panic);
    let mut flow = flow(Arc::new(core), None);

    let outcome = flow.step(&[ActionKind::EnterRandomPoolRandomAmount]).await;
    assert_eq!(outcome, StepOutcome::Failed);
    assert_eq!(flow.phase(), FlowPhase::Idle);
    assert_eq!(flow.step(&[ActionKind::EnterRandomPoolRandomAmount]).await, StepOutcome::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_runner_keeps_reports_when_one_user_panics() {
    let network = network().await;
    let mut runner = FlowRunner::new(RunSettings {
        actions: vec![ActionKind::EnterRandomPoolRandomAmount],
        total_time: Some(Duration::from_secs(120)),
        step_interval: Duration::from_secs(60),
    });
    for num in 0..3 {
        network.fund(&user(num), 500 * WEI, 0).await;
        let core: Arc<dyn CoreActions> = if num == 1 {
            Arc::new(FaultyCore::new(core_for(&network, &user(num)), Fault::Panic))
        } else {
            Arc::new(core_for(&network, &user(num)))
        };
        runner.add_flow(flow(core, None));
    }

    let report = runner.run().await;
    assert_eq!(report.users.len(), 3);
    let (name, faulty) = &report.users[1];
    assert_eq!(name, "user_1");
    assert_eq!(faulty.failed, faulty.total);
    assert!(faulty.total >= 1);
    for (_, healthy) in [&report.users[0], &report.users[2]] {
        assert_eq!(healthy.total, 2);
        assert_eq!(healthy.failed, 0);
    }
}
