//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration from an optional file, then apply process environment
/// overrides and validate the result.
pub fn load_with_env(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply deployment environment variables on top of a loaded configuration.
///
/// `lookup` resolves a variable name to its value; tests pass a map-backed
/// closure instead of touching the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = parse_env("PORT", &port)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(h, _)| h.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(v) = lookup("RATE_LIMIT_RPM") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_RPM", &v)?;
    }
    if let Some(v) = lookup("MCP_SECURITY_ENABLED") {
        config.security.enabled = v == "true";
    }
    if let Some(v) = lookup("SECURITY_SERVICE_URL") {
        config.security.service_url = v;
    }
    if let Some(v) = lookup("SECURITY_MODE") {
        config.security.mode = v;
    }
    if let Some(v) = lookup("MCP_AUDIT_ENABLED") {
        config.audit.enabled = v == "true";
    }
    if let Some(v) = lookup("AUDIT_SERVICE_URL") {
        config.audit.sink_url = v;
    }
    if let Some(v) = lookup("MODEL_RUNNER_URL") {
        config.model.base_url = v;
    }
    if let Some(v) = lookup("MODEL_RUNNER_MODEL").or_else(|| lookup("AI_DEFAULT_MODEL")) {
        config.model.model = v;
    }
    if let Some(v) = lookup("VENDOR_EVALUATION_THRESHOLD") {
        config.model.evaluation_threshold = parse_env("VENDOR_EVALUATION_THRESHOLD", &v)?;
    }
    // Naming a store or broker turns the sink on.
    if let Some(v) = lookup("MONGODB_URL") {
        config.persistence.mongodb_url = v;
        config.persistence.enabled = true;
    }
    if let Some(v) = lookup("KAFKA_BROKERS") {
        config.publishing.brokers = v
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        config.publishing.enabled = true;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "9000"),
                ("RATE_LIMIT_RPM", "10"),
                ("MCP_SECURITY_ENABLED", "true"),
                ("SECURITY_MODE", "strict"),
                ("AI_DEFAULT_MODEL", "ai/smollm2"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.rate_limit.max_requests, 10);
        assert!(config.security.enabled);
        assert_eq!(config.security.mode, "strict");
        assert_eq!(config.model.model, "ai/smollm2");
        assert!(!config.audit.enabled);
    }

    #[test]
    fn test_sink_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MONGODB_URL", "mongodb://db:27017"),
                ("KAFKA_BROKERS", "k1:9092, k2:9092,"),
            ]),
        )
        .unwrap();

        assert!(config.persistence.enabled);
        assert_eq!(config.persistence.mongodb_url, "mongodb://db:27017");
        assert!(config.publishing.enabled);
        assert_eq!(config.publishing.brokers, vec!["k1:9092", "k2:9092"]);
    }

    #[test]
    fn test_security_flag_requires_literal_true() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("MCP_SECURITY_ENABLED", "yes")])).unwrap();
        assert!(!config.security.enabled);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("RATE_LIMIT_RPM", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "RATE_LIMIT_RPM", .. }));
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nwindow_ms = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[security]\nenabled = true\nservice_url = \"http://127.0.0.1:8080\"\ntimeout_ms = 250"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.security.enabled);
        assert_eq!(config.security.timeout_ms, 250);
    }
}
