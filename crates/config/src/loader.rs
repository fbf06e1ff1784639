//! Loading `AppConfig` from files and the environment

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "FASSET_FLOW";

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Dedicated variable for the verifier API key
pub const API_KEY_ENV: &str = "FASSET_FLOW_ATTESTATION_API_KEY";

/// Reads config files, environment variables and layered combinations of both
pub struct ConfigLoader;

fn file_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(FileFormat::Toml),
        Some("yaml" | "yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        Some(other) => Err(ConfigError::LoadError(format!("unsupported config format: .{other}"))),
        None => Err(ConfigError::LoadError(format!(
            "{} has no extension to pick a format from",
            path.display()
        ))),
    }
}

impl ConfigLoader {
    /// Load a TOML, YAML or JSON file, picked by extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let format = file_format(path)?;
        let content = std::fs::read_to_string(path)?;
        match format {
            FileFormat::Yaml => Self::from_yaml(&content),
            FileFormat::Json => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables with the default prefix
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with a custom prefix
    ///
    /// Variables take the form `PREFIX__SECTION__KEY`, for example
    /// `FASSET_FLOW__FLOW__STEP_INTERVAL_SECS=30`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Merge two configurations section by section. An overlay section
    /// replaces the base one unless it is left at its defaults.
    pub fn merge(base: AppConfig, overlay: AppConfig) -> AppConfig {
        fn pick<T: Default + PartialEq>(base: T, overlay: T) -> T {
            if overlay == T::default() {
                base
            } else {
                overlay
            }
        }

        AppConfig {
            network: pick(base.network, overlay.network),
            attestation: pick(base.attestation, overlay.attestation),
            flow: pick(base.flow, overlay.flow),
            users: pick(base.users, overlay.users),
            logging: pick(base.logging, overlay.logging),
            simulation: pick(base.simulation, overlay.simulation),
        }
    }

    /// Load configuration from a file, then layer environment overrides
    /// and the API key variable on top
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let mut config = Self::builder().add_file(path, true).add_env(env_prefix).build()?;
        Self::apply_api_key(&mut config, std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Fill the verifier API key from the environment when set
    pub fn apply_api_key(config: &mut AppConfig, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|key| !key.is_empty()) {
            debug!("Using verifier API key from the environment");
            config.attestation.api_key = key;
        }
    }

    /// Layered loading through the `config` crate
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration loading
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Layer a config file; files without a known extension are read as TOML
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = file_format(path).unwrap_or(FileFormat::Toml);
        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Layer `PREFIX__SECTION__KEY` variables; `flow.actions` takes a comma list
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .list_separator(",")
                .with_list_parse_key("flow.actions")
                .try_parsing(true),
        );
        self
    }

    /// Value used when no source sets `key`
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Set a value that wins over every source
    pub fn set_override(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<AppConfig> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [network]
            verifier_chain = "xrp"

            [flow]
            total_time_secs = 3600
            step_interval_secs = 30
            actions = ["MintRandomAgentRandomAmount", "RedeemRandomAmount"]
            min_native_balance = 25

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.flow.total_time_secs, Some(3600));
        assert_eq!(config.flow.actions.len(), 2);
        assert_eq!(config.flow.min_native_balance, rust_decimal::Decimal::from(25));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.attestation.round_poll.max_attempts, 10);
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
attestation:
  fdc_url: "https://verifier.example"
  proof_poll:
    max_attempts: 3
    interval_ms: 100
users:
  count: 2
  identities:
    - num: 0
      native_address: "0xuser0"
      underlying_address: "rUser0"
    - num: 1
      native_address: "0xuser1"
      underlying_address: "rUser1"
      partner_native_address: "0xpartner1"
      partner_underlying_address: "rPartner1"
        "#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.attestation.fdc_url, "https://verifier.example");
        assert_eq!(config.attestation.proof_poll.max_attempts, 3);
        assert_eq!(config.users.identities.len(), 2);
        assert_eq!(
            config.users.identities[1].partner_native_address.as_deref(),
            Some("0xpartner1")
        );
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"
{
  "simulation": {
    "enabled": true,
    "agents": [{ "fee_bips": 25, "free_lots": 5 }]
  },
  "logging": { "level": "warn" }
}
        "#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert!(config.simulation.enabled);
        assert!(config.simulation.agents[0].pays_redemptions);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_from_file() {
        let toml = r#"
[simulation]
enabled = true
native_funding = 500
        "#;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.simulation.native_funding, 500);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            ConfigLoader::from_file(file.path()),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_builder_layers_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[flow]\nstep_interval_secs = 30\n").unwrap();

        let config = ConfigLoader::builder()
            .add_file(file.path(), true)
            .set_override("flow.step_interval_secs", "5")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.flow.step_interval_secs, 5);
    }

    #[test]
    fn test_merge_configs() {
        let base = AppConfig {
            logging: crate::LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Json,
            },
            ..Default::default()
        };

        let overlay = AppConfig {
            flow: crate::FlowSettings {
                step_interval_secs: 5,
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = ConfigLoader::merge(base, overlay);
        assert_eq!(merged.logging.level, "debug");
        assert_eq!(merged.flow.step_interval_secs, 5);
    }

    #[test]
    fn test_api_key_applied_only_when_set() {
        let mut config = AppConfig::default();
        ConfigLoader::apply_api_key(&mut config, Some(String::new()));
        assert!(config.attestation.api_key.is_empty());

        ConfigLoader::apply_api_key(&mut config, Some("secret".to_string()));
        assert_eq!(config.attestation.api_key, "secret");
    }
}
