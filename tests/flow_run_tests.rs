//! End-to-end runs from configuration to report

use fasset_flow::{build_runner, simulated_network, simulated_runner, user_pairs};
use fasset_flow_config::{validate_config, AppConfig, ConfigLoader};
use fasset_flow_protocol::CoreActions;
use rust_decimal::Decimal;
use std::path::PathBuf;

fn preset(name: &str) -> AppConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join(name);
    ConfigLoader::from_file(&path).expect("Failed to load preset")
}

fn local(data_dir: &std::path::Path) -> AppConfig {
    let mut config = preset("local.toml");
    config.users.data_dir = data_dir.to_path_buf();
    config
}

#[tokio::test(start_paused = true)]
async fn test_local_preset_runs_every_user() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local(dir.path());
    config.flow.total_time_secs = Some(60);
    config.flow.step_interval_secs = 20;
    validate_config(&config).unwrap();

    let (_network, runner) = build_runner(&config).await.unwrap();
    assert_eq!(runner.len(), 3);

    let report = runner.run().await;
    assert_eq!(report.users.len(), 3);
    for (user, flow) in &report.users {
        assert!(flow.total >= 1, "{user} ran no steps");
    }
    assert!(report.total().successful >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_pool_entries_verify_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local(dir.path());
    config.users.count = 1;
    config.flow.total_time_secs = Some(120);
    config.flow.step_interval_secs = 30;
    config.flow.actions = vec!["EnterRandomPoolRandomAmount".to_string()];

    let (_network, runner) = build_runner(&config).await.unwrap();
    let report = runner.run().await;

    let total = report.total();
    assert!(total.total >= 1);
    assert_eq!(total.failed, 0);
    assert_eq!(total.successful, total.total);
}

#[tokio::test(start_paused = true)]
async fn test_generated_users_are_funded() {
    let dir = tempfile::tempdir().unwrap();
    let config = local(dir.path());
    let pairs = user_pairs(&config);
    let network = simulated_network(&config, &pairs).await.unwrap();
    let runner = simulated_runner(&config, &network, &pairs, dir.path()).unwrap();
    assert_eq!(runner.len(), pairs.len());

    let tokens = fasset_flow::token_set(&config);
    let ctx = network
        .user_context(&pairs[0].user, tokens.clone(), fasset_flow::attestation_config(&config))
        .unwrap();
    let core = fasset_flow_protocol::ProtocolCoreActions::in_memory(ctx);
    let balances = core.balances().await.unwrap();
    assert_eq!(balances.amount(&tokens.native), Decimal::from(config.simulation.native_funding));
    assert_eq!(balances.amount(&tokens.underlying), Decimal::from(config.simulation.underlying_funding));
    assert_eq!(core.agents().await.unwrap().len(), config.simulation.agents.len());
}

#[tokio::test]
async fn test_live_preset_is_refused() {
    let mut config = preset("coston2.toml");
    ConfigLoader::apply_api_key(&mut config, Some("key".to_string()));
    validate_config(&config).unwrap();

    let err = build_runner(&config).await.err().expect("live run should be refused");
    assert!(err.to_string().contains("simulation.enabled"));
}
