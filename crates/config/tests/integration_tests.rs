//! Integration tests for the config crate

use fasset_flow_config::{validate_config, AppConfig, ConfigLoader, LogFormat};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn preset(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn test_load_coston2_config() {
    let config = ConfigLoader::from_file(&preset("coston2.toml")).expect("Failed to load coston2 config");

    assert!(!config.simulation.enabled);
    assert_eq!(config.network.fasset_token, "FTestXRP");
    assert_eq!(config.users.count, 2);
    assert_eq!(config.users.identities.len(), 2);
    assert!(config.users.identities[1].partner_native_address.is_some());

    // the API key is supplied separately
    assert!(validate_config(&config).is_err());
    let mut with_key = config;
    ConfigLoader::apply_api_key(&mut with_key, Some("key".to_string()));
    validate_config(&with_key).expect("coston2 config should validate with a key");
}

#[test]
fn test_load_local_config() {
    let config = ConfigLoader::from_file(&preset("local.toml")).expect("Failed to load local config");

    assert!(config.simulation.enabled);
    assert_eq!(config.simulation.agents.len(), 3);
    assert!(!config.simulation.agents[1].pays_redemptions);
    assert_eq!(config.flow.seed, Some(7));
    assert_eq!(config.logging.level, "debug");
    validate_config(&config).expect("local config should validate");
}

#[test]
fn test_default_config_needs_identities() {
    assert!(validate_config(&AppConfig::default()).is_err());
}

#[test]
fn test_load_yaml_file() {
    let yaml = r#"
flow:
  step_interval_secs: 15
  actions: ["EnterRandomPoolRandomAmount", "ExitRandomPoolRandomAmount"]
logging:
  format: json
simulation:
  enabled: true
"#;

    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::from_file(file.path()).unwrap();
    assert_eq!(config.flow.step_interval(), std::time::Duration::from_secs(15));
    assert_eq!(config.logging.format, LogFormat::Json);
    validate_config(&config).unwrap();
}

#[test]
fn test_missing_extension_rejected() {
    let file = NamedTempFile::new().unwrap();
    assert!(ConfigLoader::from_file(file.path()).is_err());
}

#[test]
fn test_from_file_with_env_requires_existing_file() {
    let result = ConfigLoader::from_file_with_env(&preset("missing.toml"), "FASSET_FLOW_TEST_MISSING");
    assert!(result.is_err());
}

#[test]
fn test_from_file_with_env_reads_file() {
    let config = ConfigLoader::from_file_with_env(&preset("local.toml"), "FASSET_FLOW_TEST_UNSET")
        .expect("Failed to layer local config");
    assert_eq!(config.users.count, 3);
    assert_eq!(config.flow.mint_redeem_delay_ms, 1000);
}

#[test]
fn test_builder_default_fills_missing_keys() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"[simulation]\nenabled = true\n").unwrap();

    let config = ConfigLoader::builder()
        .set_default("users.count", "4")
        .unwrap()
        .add_file(file.path(), true)
        .build()
        .unwrap();
    assert_eq!(config.users.count, 4);
    assert!(config.simulation.enabled);
}
