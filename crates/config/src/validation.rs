//! Configuration validation

use crate::{AppConfig, ConfigError, PollConfig, Result};
use std::collections::HashSet;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();
    let simulated = config.simulation.enabled;

    // Endpoints are only dialled against live chains
    if !simulated {
        let urls = [
            ("network.rpc_url", &config.network.rpc_url),
            ("network.underlying_rpc_url", &config.network.underlying_rpc_url),
            ("attestation.fdc_url", &config.attestation.fdc_url),
            ("attestation.da_url", &config.attestation.da_url),
        ];
        for (field, url) in urls {
            if let Err(e) = validate_url(url) {
                errors.push(ValidationError::new(field, e));
            }
        }

        if config.attestation.api_key.is_empty() {
            errors.push(ValidationError::new(
                "attestation.api_key",
                "verifier API key is required",
            ));
        }
    }

    if config.network.verifier_chain.is_empty() {
        errors.push(ValidationError::new(
            "network.verifier_chain",
            "verifier chain is required",
        ));
    }

    if config.network.source_id.is_empty() {
        errors.push(ValidationError::new("network.source_id", "source id is required"));
    }

    if config.attestation.request_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "attestation.request_timeout_ms",
            "must be greater than 0",
        ));
    }

    let polls = [
        ("attestation.round_poll", &config.attestation.round_poll),
        ("attestation.proof_poll", &config.attestation.proof_poll),
        ("attestation.tx_lookup", &config.attestation.tx_lookup),
    ];
    for (field, poll) in polls {
        if let Err(e) = validate_poll(poll) {
            errors.push(ValidationError::new(field, e));
        }
    }

    // Validate flow settings
    if config.flow.step_interval_secs == 0 {
        errors.push(ValidationError::new(
            "flow.step_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.flow.total_time_secs == Some(0) {
        errors.push(ValidationError::new(
            "flow.total_time_secs",
            "must be greater than 0 when set",
        ));
    }

    if config.flow.min_native_balance.is_sign_negative() {
        errors.push(ValidationError::new(
            "flow.min_native_balance",
            "must not be negative",
        ));
    }

    if let Err(e) = fasset_flow_actions::parse_actions(&config.flow.actions) {
        errors.push(ValidationError::new("flow.actions", e.to_string()));
    }

    let unique_actions: HashSet<_> = config.flow.actions.iter().collect();
    if unique_actions.len() != config.flow.actions.len() {
        errors.push(ValidationError::new("flow.actions", "duplicate actions found"));
    }

    // Validate users
    if config.users.count == 0 {
        errors.push(ValidationError::new("users.count", "at least one user is required"));
    }

    let identities = &config.users.identities;
    if identities.is_empty() {
        if !simulated {
            errors.push(ValidationError::new(
                "users.identities",
                "identities are required unless simulation is enabled",
            ));
        }
    } else if identities.len() != config.users.count as usize {
        errors.push(ValidationError::new(
            "users.identities",
            format!(
                "expected {} identities, found {}",
                config.users.count,
                identities.len()
            ),
        ));
    }

    let nums: HashSet<_> = identities.iter().map(|identity| identity.num).collect();
    if nums.len() != identities.len() {
        errors.push(ValidationError::new("users.identities", "duplicate user numbers found"));
    }

    for (idx, identity) in identities.iter().enumerate() {
        if identity.native_address.is_empty() || identity.underlying_address.is_empty() {
            errors.push(ValidationError::new(
                format!("users.identities[{idx}]"),
                "native and underlying addresses are required",
            ));
        }
        if identity.partner_native_address.is_some() != identity.partner_underlying_address.is_some() {
            errors.push(ValidationError::new(
                format!("users.identities[{idx}]"),
                "partner needs both a native and an underlying address",
            ));
        }
    }

    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    // Validate simulation
    if simulated {
        if config.simulation.agents.is_empty() {
            errors.push(ValidationError::new(
                "simulation.agents",
                "at least one agent is required",
            ));
        }

        for (idx, agent) in config.simulation.agents.iter().enumerate() {
            if agent.fee_bips > 10000 {
                errors.push(ValidationError::new(
                    format!("simulation.agents[{idx}].fee_bips"),
                    "must be <= 10000 (100%)",
                ));
            }
        }
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate a URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

fn validate_poll(poll: &PollConfig) -> std::result::Result<(), String> {
    if poll.max_attempts == 0 {
        return Err("max_attempts must be greater than 0".to_string());
    }

    if poll.interval_ms == 0 {
        return Err("interval_ms must be greater than 0".to_string());
    }

    Ok(())
}

/// Validate log level
pub fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdentityConfig;

    fn live_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.attestation.api_key = "key".to_string();
        config.users.identities = vec![IdentityConfig {
            num: 0,
            native_address: "0xuser0".to_string(),
            underlying_address: "rUser0".to_string(),
            partner_native_address: None,
            partner_underlying_address: None,
        }];
        config
    }

    fn simulated_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.simulation.enabled = true;
        config
    }

    fn message(config: &AppConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&live_config()).is_ok());
        assert!(validate_config(&simulated_config()).is_ok());
    }

    #[test]
    fn test_live_requires_api_key_and_identities() {
        let mut config = AppConfig::default();
        config.users.count = 2;
        let msg = message(&config);
        assert!(msg.contains("attestation.api_key"));
        assert!(msg.contains("users.identities"));
    }

    #[test]
    fn test_simulation_skips_endpoint_checks() {
        let mut config = simulated_config();
        config.attestation.fdc_url = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = live_config();
        config.attestation.da_url = "ftp://da.example".to_string();
        assert!(message(&config).contains("attestation.da_url"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let mut config = simulated_config();
        config.flow.actions = vec!["MintRandomAgentRandomAmount".to_string(), "Teleport".to_string()];
        assert!(message(&config).contains("flow.actions"));
    }

    #[test]
    fn test_duplicate_actions_rejected() {
        let mut config = simulated_config();
        config.flow.actions = vec!["Scenario1".to_string(), "Scenario1".to_string()];
        assert!(message(&config).contains("duplicate actions"));
    }

    #[test]
    fn test_zero_poll_bounds_rejected() {
        let mut config = simulated_config();
        config.attestation.proof_poll.max_attempts = 0;
        config.attestation.tx_lookup.interval_ms = 0;
        let msg = message(&config);
        assert!(msg.contains("attestation.proof_poll"));
        assert!(msg.contains("attestation.tx_lookup"));
    }

    #[test]
    fn test_identity_count_mismatch() {
        let mut config = live_config();
        config.users.count = 3;
        assert!(message(&config).contains("expected 3 identities, found 1"));
    }

    #[test]
    fn test_half_configured_partner_rejected() {
        let mut config = live_config();
        config.users.identities[0].partner_native_address = Some("0xpartner0".to_string());
        assert!(message(&config).contains("partner needs both"));
    }

    #[test]
    fn test_simulation_needs_agents() {
        let mut config = simulated_config();
        config.simulation.agents.clear();
        assert!(message(&config).contains("simulation.agents"));
    }

    #[test]
    fn test_validate_log_level() {
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = simulated_config();
        config.flow.step_interval_secs = 0;
        config.users.count = 0;
        config.logging.level = "loud".to_string();
        let msg = message(&config);
        assert_eq!(msg.split("; ").count(), 3);
    }
}
