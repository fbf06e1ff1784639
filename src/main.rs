//! FAsset flow driver
//!
//! Runs one stochastic flow per configured user: every step snapshots the
//! user's state, picks an eligible action at random, executes it and checks
//! the resulting state against the prediction.

use anyhow::Context;
use clap::Parser;
use fasset_flow::{attestation_services, build_runner, check_attestation_services};
use fasset_flow_config::{validate_config, AppConfig, ConfigLoader, LogFormat, ENV_PREFIX};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// FAsset flow driver CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (TOML, YAML or JSON)
    #[arg(long, short, default_value = "config/local.toml")]
    config: PathBuf,

    /// Total run time in seconds; overrides flow.total_time_secs
    #[arg(long)]
    total_time: Option<u64>,

    /// Seconds between steps; overrides flow.step_interval_secs
    #[arg(long)]
    step_interval: Option<u64>,

    /// Number of users; overrides users.count
    #[arg(long)]
    users: Option<u32>,

    /// Restrict the run to these actions (comma separated)
    #[arg(long, value_delimiter = ',')]
    actions: Vec<String>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Check the configuration and exit
    #[arg(long)]
    check: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(total_time) = self.total_time {
            config.flow.total_time_secs = Some(total_time);
        }
        if let Some(step_interval) = self.step_interval {
            config.flow.step_interval_secs = step_interval;
        }
        if let Some(users) = self.users {
            config.users.count = users;
        }
        if !self.actions.is_empty() {
            config.flow.actions = self.actions.clone();
        }
        if self.seed.is_some() {
            config.flow.seed = self.seed;
        }
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.context("failed to initialize tracing")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    let args = Args::parse();
    let mut config = ConfigLoader::from_file_with_env(&args.config, ENV_PREFIX)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    args.apply(&mut config);

    init_tracing(&config)?;
    validate_config(&config).context("invalid configuration")?;

    if !config.simulation.enabled {
        let services = attestation_services(&config)?;
        check_attestation_services(&services).await?;
    }

    if args.check {
        info!(config = %args.config.display(), "Configuration is valid");
        return Ok(());
    }

    info!(
        config = %args.config.display(),
        users = config.users.count,
        simulated = config.simulation.enabled,
        "Starting FAsset flow driver"
    );

    // the network must outlive the flows that drive it
    let (_network, runner) = build_runner(&config).await?;

    let report = tokio::select! {
        report = runner.run() => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping flows");
            return Ok(());
        }
    };

    for (user, flow) in &report.users {
        info!(user = %user, "{flow}");
    }
    let total = report.total();
    if total.all_passed() {
        info!("All flows finished. {total}");
    } else {
        error!("Flows finished with failures. {total}");
    }
    Ok(())
}
