//! Turns an [`AppConfig`] into a ready-to-run [`FlowRunner`].

use anyhow::{bail, Context};
use chrono::Utc;
use fasset_flow_actions::{parse_actions, ActionSettings};
use fasset_flow_attestation::{
    AttestationConfig, BlockRange, DataAvailabilityApi, HttpDataAvailabilityClient, HttpVerifierClient, PollPolicy,
    VerifierApi,
};
use fasset_flow_config::{AppConfig, IdentityConfig, PollConfig};
use fasset_flow_orchestrator::{FlowConfig, FlowOrchestrator, FlowRunner, RunSettings};
use fasset_flow_protocol::{AgentSetup, CoreActions, ProtocolCoreActions, SimulatedNetwork, SimulationParams};
use fasset_flow_types::{Token, TokenSet, UserIdentity};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A user identity and its optional partner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPair {
    pub user: UserIdentity,
    pub partner: Option<UserIdentity>,
}

pub fn token_set(config: &AppConfig) -> TokenSet {
    let network = &config.network;
    let underlying = Token::underlying(&network.underlying_token, network.underlying_decimals);
    TokenSet::new(
        Token::native(&network.native_token, network.native_decimals),
        underlying.clone(),
        Token::fasset(&network.fasset_token, &underlying),
    )
}

fn poll_policy(poll: &PollConfig) -> PollPolicy {
    PollPolicy::new(poll.max_attempts, poll.interval())
}

pub fn attestation_config(config: &AppConfig) -> AttestationConfig {
    let attestation = &config.attestation;
    AttestationConfig {
        source_name: config.network.source_id.clone(),
        round_poll: poll_policy(&attestation.round_poll),
        proof_poll: poll_policy(&attestation.proof_poll),
        tx_lookup: poll_policy(&attestation.tx_lookup),
    }
}

pub fn run_settings(config: &AppConfig) -> anyhow::Result<RunSettings> {
    let actions = parse_actions(&config.flow.actions).context("invalid flow.actions")?;
    Ok(RunSettings {
        actions,
        total_time: config.flow.total_time(),
        step_interval: config.flow.step_interval(),
    })
}

/// Flow parameters of user `num`; the seed is offset so users diverge
pub fn flow_config(config: &AppConfig, num: u32) -> FlowConfig {
    let flow = &config.flow;
    FlowConfig {
        min_native_balance: flow.min_native_balance,
        action_settings: ActionSettings {
            mint_redeem_delay: Duration::from_millis(flow.mint_redeem_delay_ms),
            partner_transfer_delay: Duration::from_millis(flow.partner_transfer_delay_ms),
            ..ActionSettings::default()
        },
        seed: flow.seed.map(|seed| seed.wrapping_add(u64::from(num))),
    }
}

fn configured_pair(identity: &IdentityConfig) -> UserPair {
    let partner = match (&identity.partner_native_address, &identity.partner_underlying_address) {
        (Some(native), Some(underlying)) => Some(UserIdentity::new(identity.num, true, native, underlying)),
        _ => None,
    };
    UserPair {
        user: UserIdentity::new(
            identity.num,
            false,
            &identity.native_address,
            &identity.underlying_address,
        ),
        partner,
    }
}

fn generated_pair(num: u32) -> UserPair {
    UserPair {
        user: UserIdentity::new(
            num,
            false,
            format!("0x{:040x}", 0x5E_0000_u64 + u64::from(num)),
            format!("rUser{num}"),
        ),
        partner: Some(UserIdentity::new(
            num,
            true,
            format!("0x{:040x}", 0x9A_0000_u64 + u64::from(num)),
            format!("rPartner{num}"),
        )),
    }
}

/// Configured identities, or generated ones with partners when none are listed
pub fn user_pairs(config: &AppConfig) -> Vec<UserPair> {
    if config.users.identities.is_empty() {
        (0..config.users.count).map(generated_pair).collect()
    } else {
        config.users.identities.iter().map(configured_pair).collect()
    }
}

/// Simulated network with the configured agents and funded users
pub async fn simulated_network(config: &AppConfig, pairs: &[UserPair]) -> anyhow::Result<SimulatedNetwork> {
    let network = SimulatedNetwork::new(SimulationParams::default());
    for (index, agent) in config.simulation.agents.iter().enumerate() {
        let setup = AgentSetup::new(index, agent.fee_bips, agent.free_lots)
            .with_pays_redemptions(agent.pays_redemptions);
        info!(vault = %setup.vault, fee_bips = agent.fee_bips, free_lots = agent.free_lots, "Registered agent");
        network.add_agent(setup).await;
    }

    let tokens = token_set(config);
    let sim = &config.simulation;
    let native = tokens.native.to_uba(Decimal::from(sim.native_funding))?;
    let underlying = tokens.underlying.to_uba(Decimal::from(sim.underlying_funding))?;
    let partner_native = tokens.native.to_uba(Decimal::from(sim.partner_native_funding))?;

    for pair in pairs {
        network.fund(&pair.user, native, underlying).await;
        if let Some(partner) = &pair.partner {
            network.fund(partner, partner_native, 0).await;
        }
    }
    Ok(network)
}

fn core_for(
    network: &SimulatedNetwork,
    config: &AppConfig,
    records_dir: &Path,
    identity: &UserIdentity,
) -> anyhow::Result<Arc<dyn CoreActions>> {
    let ctx = network
        .user_context(identity, token_set(config), attestation_config(config))
        .with_context(|| format!("failed to set up {identity}"))?;
    Ok(Arc::new(ProtocolCoreActions::with_json_store(ctx, records_dir)))
}

/// A simulated network starts empty, so its records get a fresh directory
pub fn simulation_records_dir(config: &AppConfig) -> PathBuf {
    config
        .users
        .data_dir
        .join(format!("simulated-{}", Utc::now().format("%Y%m%dT%H%M%S")))
}

/// One flow per user, all driving the same simulated network
pub fn simulated_runner(
    config: &AppConfig,
    network: &SimulatedNetwork,
    pairs: &[UserPair],
    records_dir: &Path,
) -> anyhow::Result<FlowRunner> {
    info!(records = %records_dir.display(), "Storing request records");
    let mut runner = FlowRunner::new(run_settings(config)?);
    for pair in pairs {
        let mut builder = FlowOrchestrator::builder()
            .with_core(core_for(network, config, records_dir, &pair.user)?)
            .with_config(flow_config(config, pair.user.num));
        if let Some(partner) = &pair.partner {
            builder = builder.with_partner(core_for(network, config, records_dir, partner)?);
        }
        runner.add_flow(builder.build()?);
    }
    Ok(runner)
}

/// REST clients of the live verifier and data-availability services
pub struct AttestationServices {
    pub verifier: HttpVerifierClient,
    pub data_availability: HttpDataAvailabilityClient,
}

pub fn attestation_services(config: &AppConfig) -> anyhow::Result<AttestationServices> {
    let attestation = &config.attestation;
    let timeout = Duration::from_millis(attestation.request_timeout_ms);
    let verifier = HttpVerifierClient::new(
        &attestation.fdc_url,
        &config.network.verifier_chain,
        &attestation.api_key,
        timeout,
    )
    .context("failed to build verifier client")?;
    let data_availability = HttpDataAvailabilityClient::new(&attestation.da_url, &attestation.api_key, timeout)
        .context("failed to build data-availability client")?;
    Ok(AttestationServices {
        verifier,
        data_availability,
    })
}

/// Read the latest voting round and the verifier's indexed block range
pub async fn check_attestation_services(services: &AttestationServices) -> anyhow::Result<(u64, BlockRange)> {
    let round = services
        .data_availability
        .latest_voting_round()
        .await
        .context("data-availability service check failed")?;
    let range = services
        .verifier
        .block_range()
        .await
        .context("verifier check failed")?;
    info!(
        voting_round = round,
        first_block = range.first,
        last_block = range.last,
        "Attestation services reachable"
    );
    Ok((round, range))
}

/// Everything a run needs, built from configuration
pub async fn build_runner(config: &AppConfig) -> anyhow::Result<(SimulatedNetwork, FlowRunner)> {
    if !config.simulation.enabled {
        bail!("live networks need contract bindings; set simulation.enabled = true to run against the simulated network");
    }
    let pairs = user_pairs(config);
    let network = simulated_network(config, &pairs).await?;
    let runner = simulated_runner(config, &network, &pairs, &simulation_records_dir(config))?;
    Ok((network, runner))
}
