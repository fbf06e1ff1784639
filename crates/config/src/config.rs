//! Configuration structures for the FAsset flow driver

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub attestation: AttestationSettings,

    #[serde(default)]
    pub flow: FlowSettings,

    #[serde(default)]
    pub users: UsersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Chains and token names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_native_token")]
    pub native_token: String,

    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,

    #[serde(default = "default_underlying_token")]
    pub underlying_token: String,

    #[serde(default = "default_underlying_decimals")]
    pub underlying_decimals: u32,

    #[serde(default = "default_fasset_token")]
    pub fasset_token: String,

    /// Native chain RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Underlying chain RPC endpoint
    #[serde(default = "default_underlying_rpc_url")]
    pub underlying_rpc_url: String,

    /// Attested source name, e.g. `testXRP`
    #[serde(default = "default_underlying_token")]
    pub source_id: String,

    /// Verifier path segment of the underlying chain
    #[serde(default = "default_verifier_chain")]
    pub verifier_chain: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            native_token: default_native_token(),
            native_decimals: default_native_decimals(),
            underlying_token: default_underlying_token(),
            underlying_decimals: default_underlying_decimals(),
            fasset_token: default_fasset_token(),
            rpc_url: default_rpc_url(),
            underlying_rpc_url: default_underlying_rpc_url(),
            source_id: default_underlying_token(),
            verifier_chain: default_verifier_chain(),
        }
    }
}

/// Fixed-interval polling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl PollConfig {
    pub const fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Verifier and data-availability endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationSettings {
    #[serde(default = "default_fdc_url")]
    pub fdc_url: String,

    #[serde(default = "default_da_url")]
    pub da_url: String,

    /// Verifier API key; usually supplied through the environment
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_round_poll")]
    pub round_poll: PollConfig,

    #[serde(default = "default_proof_poll")]
    pub proof_poll: PollConfig,

    #[serde(default = "default_tx_lookup")]
    pub tx_lookup: PollConfig,
}

impl Default for AttestationSettings {
    fn default() -> Self {
        Self {
            fdc_url: default_fdc_url(),
            da_url: default_da_url(),
            api_key: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            round_poll: default_round_poll(),
            proof_poll: default_proof_poll(),
            tx_lookup: default_tx_lookup(),
        }
    }
}

/// Flow loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSettings {
    /// Time budget; run until stopped when absent
    #[serde(default)]
    pub total_time_secs: Option<u64>,

    #[serde(default = "default_step_interval_secs")]
    pub step_interval_secs: u64,

    /// Action names to pick from; empty means all
    #[serde(default)]
    pub actions: Vec<String>,

    /// Native balance a user must exceed before acting
    #[serde(default = "default_min_native_balance")]
    pub min_native_balance: Decimal,

    /// Seed for reproducible runs; each user offsets it by its number
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_mint_redeem_delay_ms")]
    pub mint_redeem_delay_ms: u64,

    #[serde(default = "default_partner_transfer_delay_ms")]
    pub partner_transfer_delay_ms: u64,
}

impl FlowSettings {
    pub fn total_time(&self) -> Option<Duration> {
        self.total_time_secs.map(Duration::from_secs)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_secs(self.step_interval_secs)
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            total_time_secs: None,
            step_interval_secs: default_step_interval_secs(),
            actions: Vec::new(),
            min_native_balance: default_min_native_balance(),
            seed: None,
            mint_redeem_delay_ms: default_mint_redeem_delay_ms(),
            partner_transfer_delay_ms: default_partner_transfer_delay_ms(),
        }
    }
}

/// Simulated user identities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersConfig {
    #[serde(default = "default_user_count")]
    pub count: u32,

    /// Root directory of the per-user request records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Addresses per user; generated in simulation mode when empty
    #[serde(default)]
    pub identities: Vec<IdentityConfig>,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            count: default_user_count(),
            data_dir: default_data_dir(),
            identities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub num: u32,
    pub native_address: String,
    pub underlying_address: String,
    #[serde(default)]
    pub partner_native_address: Option<String>,
    #[serde(default)]
    pub partner_underlying_address: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// In-memory network used instead of live chains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sim_agents")]
    pub agents: Vec<SimAgentConfig>,

    /// Whole native tokens given to every user
    #[serde(default = "default_native_funding")]
    pub native_funding: u64,

    /// Whole underlying tokens given to every user
    #[serde(default = "default_underlying_funding")]
    pub underlying_funding: u64,

    /// Whole native tokens given to every partner
    #[serde(default = "default_partner_native_funding")]
    pub partner_native_funding: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            agents: default_sim_agents(),
            native_funding: default_native_funding(),
            underlying_funding: default_underlying_funding(),
            partner_native_funding: default_partner_native_funding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimAgentConfig {
    pub fee_bips: u32,
    pub free_lots: u64,
    #[serde(default = "default_true")]
    pub pays_redemptions: bool,
}

// Default value functions
fn default_native_token() -> String {
    "C2FLR".to_string()
}

fn default_native_decimals() -> u32 {
    18
}

fn default_underlying_token() -> String {
    "testXRP".to_string()
}

fn default_underlying_decimals() -> u32 {
    6
}

fn default_fasset_token() -> String {
    "FTestXRP".to_string()
}

fn default_rpc_url() -> String {
    "https://coston2-api.flare.network/ext/C/rpc".to_string()
}

fn default_underlying_rpc_url() -> String {
    "https://s.altnet.rippletest.net:51234".to_string()
}

fn default_verifier_chain() -> String {
    "xrp".to_string()
}

fn default_fdc_url() -> String {
    "https://fdc-verifiers-testnet.flare.network".to_string()
}

fn default_da_url() -> String {
    "https://ctn2-data-availability.flare.network".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_round_poll() -> PollConfig {
    PollConfig::new(10, 5_000)
}

fn default_proof_poll() -> PollConfig {
    PollConfig::new(20, 15_000)
}

fn default_tx_lookup() -> PollConfig {
    PollConfig::new(5, 10_000)
}

fn default_step_interval_secs() -> u64 {
    60
}

fn default_min_native_balance() -> Decimal {
    Decimal::from(10)
}

fn default_mint_redeem_delay_ms() -> u64 {
    10_000
}

fn default_partner_transfer_delay_ms() -> u64 {
    5_000
}

fn default_user_count() -> u32 {
    1
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sim_agents() -> Vec<SimAgentConfig> {
    vec![
        SimAgentConfig {
            fee_bips: 100,
            free_lots: 50,
            pays_redemptions: true,
        },
        SimAgentConfig {
            fee_bips: 50,
            free_lots: 20,
            pays_redemptions: false,
        },
    ]
}

fn default_native_funding() -> u64 {
    10_000
}

fn default_underlying_funding() -> u64 {
    1_000
}

fn default_partner_native_funding() -> u64 {
    100
}

fn default_true() -> bool {
    true
}
