//! Protocol drivers against the simulated network

use fasset_flow_attestation::AttestationConfig;
use fasset_flow_protocol::{
    AgentSetup, CoreActions, JsonFileStore, ProtocolCoreActions, RecordStore, SimulatedNetwork, SimulationParams,
};
use fasset_flow_types::{Balances, MintRecord, RedeemRecord, TokenSet, UserIdentity};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

const WEI: u128 = 1_000_000_000_000_000_000;
const UBA: u128 = 1_000_000;

fn identity() -> UserIdentity {
    UserIdentity::new(0, false, "0xuser0", "rUser0")
}

async fn setup(params: SimulationParams, agents: Vec<AgentSetup>) -> (SimulatedNetwork, ProtocolCoreActions) {
    let network = SimulatedNetwork::new(params);
    for agent in agents {
        network.add_agent(agent).await;
    }
    network.fund(&identity(), 5_000 * WEI, 1_000 * UBA).await;
    let ctx = network
        .user_context(&identity(), TokenSet::coston2_test_xrp(), AttestationConfig::default())
        .unwrap();
    (network, ProtocolCoreActions::in_memory(ctx))
}

async fn default_setup() -> (SimulatedNetwork, ProtocolCoreActions) {
    setup(SimulationParams::default(), vec![AgentSetup::new(0, 100, 20)]).await
}

fn amount(balances: &Balances, core: &ProtocolCoreActions, which: &str) -> Decimal {
    let tokens = core.tokens();
    let token = match which {
        "native" => &tokens.native,
        "underlying" => &tokens.underlying,
        _ => &tokens.fasset,
    };
    balances.amount(token)
}

#[tokio::test(start_paused = true)]
async fn test_mint_moves_underlying_into_fassets() {
    let (_network, core) = default_setup().await;
    let agent = core.agents().await.unwrap().remove(0);
    assert_eq!(agent.fee, Decimal::new(1, 2));
    assert_eq!(core.lot_size().await.unwrap(), Decimal::from(10));

    let mut expected = core.balances().await.unwrap();
    core.mint(2, &agent.address).await.unwrap();
    expected.subtract_fees(core.fee_tracker());

    let tokens = core.tokens().clone();
    expected.debit(&tokens.underlying, Decimal::from(20) * (Decimal::ONE + agent.fee));
    expected.credit(&tokens.fasset, Decimal::from(20));

    let actual = core.balances().await.unwrap();
    assert_eq!(actual, expected, "expected {expected}, got {actual}");
    assert_eq!(amount(&actual, &core, "fasset"), Decimal::from(20));
    assert!(core.mint_status().await.unwrap().is_empty());

    // the agent's free capacity shrinks by the minted lots
    assert_eq!(core.agents().await.unwrap()[0].max_lots, 18);
}

#[tokio::test(start_paused = true)]
async fn test_failed_execution_leaves_pending_mint() {
    let (network, core) = default_setup().await;
    let agent = core.agents().await.unwrap().remove(0);

    network.fail_next_executions(1).await;
    assert!(core.mint(3, &agent.address).await.is_err());

    let status = core.mint_status().await.unwrap();
    assert_eq!(status.pending.len(), 1);
    let id = *status.pending.iter().next().unwrap();
    assert_eq!(core.mint_record(id).await.unwrap().lots, 3);

    core.mint_execute(id).await.unwrap();
    let balances = core.balances().await.unwrap();
    assert_eq!(amount(&balances, &core, "fasset"), Decimal::from(30));
    assert!(core.mint_status().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_paid_redemption_becomes_success() {
    let (network, core) = default_setup().await;
    let agent = core.agents().await.unwrap().remove(0);
    core.mint(2, &agent.address).await.unwrap();

    let before = core.balances().await.unwrap();
    let remaining = core.redeem(2).await.unwrap();
    assert_eq!(remaining, 0);

    let status = core.redemption_status().await.unwrap();
    assert_eq!(status.pending.len(), 1);
    let id = *status.pending.iter().next().unwrap();
    assert_eq!(core.redeem_record(id).await.unwrap().lots, 2);

    network.advance_underlying_blocks(1).await;
    let status = core.redemption_status().await.unwrap();
    assert!(status.success.contains(&id));

    let after = core.balances().await.unwrap();
    assert_eq!(amount(&after, &core, "fasset"), Decimal::ZERO);
    // 20 redeemed minus the 2% redemption fee
    assert_eq!(
        amount(&after, &core, "underlying") - amount(&before, &core, "underlying"),
        Decimal::new(196, 1)
    );

    core.remove_inactive_records().await.unwrap();
    assert!(core.redemption_record_ids().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unpaid_redemption_defaults() {
    let agent_setup = AgentSetup::new(0, 100, 20).with_pays_redemptions(false);
    let (network, core) = setup(SimulationParams::default(), vec![agent_setup]).await;
    let agent = core.agents().await.unwrap().remove(0);
    core.mint(1, &agent.address).await.unwrap();
    core.redeem(1).await.unwrap();

    network.advance_underlying_blocks(11).await;
    let status = core.redemption_status().await.unwrap();
    assert_eq!(status.default.len(), 1);
    let id = *status.default.iter().next().unwrap();

    let before = core.balances().await.unwrap();
    core.redeem_default(id).await.unwrap();
    let after = core.balances().await.unwrap();
    assert_eq!(
        amount(&after, &core, "underlying") - amount(&before, &core, "underlying"),
        Decimal::new(98, 1)
    );
    assert!(core.redemption_status().await.unwrap().default.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_redeem_reports_unfulfilled_lots() {
    let params = SimulationParams {
        max_redeemed_tickets: 1,
        ..SimulationParams::default()
    };
    let (_network, core) = setup(
        params,
        vec![AgentSetup::new(0, 100, 20), AgentSetup::new(1, 100, 20)],
    )
    .await;
    let agents = core.agents().await.unwrap();
    core.mint(1, &agents[0].address).await.unwrap();
    core.mint(1, &agents[1].address).await.unwrap();

    let remaining = core.redeem(2).await.unwrap();
    assert_eq!(remaining, 1);

    let balances = core.balances().await.unwrap();
    assert_eq!(amount(&balances, &core, "fasset"), Decimal::from(10));
    assert_eq!(core.redemption_record_ids().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pool_enter_then_exit_returns_collateral() {
    let (_network, core) = default_setup().await;
    let pool = core.pools().await.unwrap().remove(0);
    let before = core.balances().await.unwrap();

    core.enter_pool(&pool.address, Decimal::from(10)).await.unwrap();
    let holdings = core.pool_holdings().await.unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].pool_tokens, Decimal::from(10));
    // freshly entered tokens are timelocked
    assert_eq!(holdings[0].max_amount_to_exit, Some(Decimal::ZERO));

    let timelock = core.pool_token_timelock().await.unwrap();
    tokio::time::sleep(timelock + Duration::from_secs(1)).await;
    assert_eq!(core.max_exit_tokens(&pool.address).await.unwrap(), Decimal::from(10));

    core.exit_pool(&pool.address, Decimal::from(10)).await.unwrap();
    assert!(core.pool_holdings().await.unwrap().is_empty());

    let mut expected = before;
    expected.subtract_fees(core.fee_tracker());
    assert_eq!(core.balances().await.unwrap(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_small_entry_into_agent_funded_pool_round_trips() {
    let (_network, core) = default_setup().await;
    let pool = core.pools().await.unwrap().remove(0);
    let stats = core.pool_stats(&pool.address).await.unwrap();
    assert_eq!(stats.total_collateral, Decimal::from(100_000));
    let before = core.balances().await.unwrap();

    core.enter_pool(&pool.address, Decimal::from(2)).await.unwrap();
    let holdings = core.pool_holdings().await.unwrap();
    assert_eq!(holdings[0].pool_tokens, Decimal::from(2));
    assert_eq!(
        core.pool_stats(&pool.address).await.unwrap().total_collateral,
        Decimal::from(100_002)
    );

    tokio::time::sleep(core.pool_token_timelock().await.unwrap() + Duration::from_secs(1)).await;
    core.exit_pool(&pool.address, Decimal::from(2)).await.unwrap();
    assert!(core.pool_holdings().await.unwrap().is_empty());

    let mut expected = before;
    expected.subtract_fees(core.fee_tracker());
    assert_eq!(core.balances().await.unwrap(), expected);
    assert_eq!(core.pool_stats(&pool.address).await.unwrap().total_collateral, stats.total_collateral);
}

#[tokio::test(start_paused = true)]
async fn test_minting_fees_accrue_to_pool_holders() {
    let (_network, core) = default_setup().await;
    let agent = core.agents().await.unwrap().remove(0);
    let pool = core.pools().await.unwrap().remove(0);

    core.enter_pool(&pool.address, Decimal::from(1_000)).await.unwrap();
    core.mint(2, &agent.address).await.unwrap();

    let fees = core.fasset_fees(&pool.address).await.unwrap();
    assert!(fees > Decimal::ZERO);

    let before = core.balances().await.unwrap();
    core.withdraw_pool_fees(&pool.address, fees).await.unwrap();
    let after = core.balances().await.unwrap();
    assert_eq!(
        amount(&after, &core, "fasset") - amount(&before, &core, "fasset"),
        fees
    );
    assert_eq!(core.fasset_fees(&pool.address).await.unwrap(), Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transfer_moves_debt_free_tokens_to_partner() {
    let (network, core) = default_setup().await;
    let pool = core.pools().await.unwrap().remove(0);
    let partner = UserIdentity::new(0, true, "0xpartner0", "rPartner0");
    network.fund(&partner, 100 * WEI, 0).await;
    let partner_ctx = network
        .user_context(&partner, TokenSet::coston2_test_xrp(), AttestationConfig::default())
        .unwrap();
    let partner_core = ProtocolCoreActions::in_memory(partner_ctx);

    core.enter_pool(&pool.address, Decimal::from(10)).await.unwrap();
    assert!(core
        .transfer_pool_tokens(&pool.address, &partner.native_address, Decimal::from(4))
        .await
        .is_err());

    tokio::time::sleep(Duration::from_secs(31)).await;
    core.transfer_pool_tokens(&pool.address, &partner.native_address, Decimal::from(4))
        .await
        .unwrap();

    assert_eq!(core.debt_free_tokens(&pool.address).await.unwrap(), Decimal::from(6));
    assert_eq!(partner_core.debt_free_tokens(&pool.address).await.unwrap(), Decimal::from(4));

    partner_core.exit_pool(&pool.address, Decimal::from(4)).await.unwrap();
    assert!(partner_core.pool_holdings().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_json_store_keeps_pending_requests() {
    let dir = tempfile::tempdir().unwrap();
    let network = SimulatedNetwork::new(SimulationParams::default());
    network.add_agent(AgentSetup::new(0, 100, 20)).await;
    network.fund(&identity(), 100 * WEI, 100 * UBA).await;
    let ctx = network
        .user_context(&identity(), TokenSet::coston2_test_xrp(), AttestationConfig::default())
        .unwrap();
    let core = ProtocolCoreActions::with_json_store(ctx, dir.path());

    let agent = core.agents().await.unwrap().remove(0);
    network.fail_next_executions(1).await;
    assert!(core.mint(1, &agent.address).await.is_err());

    let store: Arc<JsonFileStore<MintRecord>> = Arc::new(JsonFileStore::new(dir.path(), "user_0"));
    let records = store.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].lots, 1);

    let redeem_store: JsonFileStore<RedeemRecord> = JsonFileStore::new(dir.path(), "user_0");
    assert!(redeem_store.records().await.unwrap().is_empty());
}
