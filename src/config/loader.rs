//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply `TUBE_*` environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override config values from variables resolved by `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    override_from(&lookup, "TUBE_SERVER_BIND_ADDRESS", &mut config.server.bind_address)?;
    override_from(&lookup, "TUBE_SERVER_REQUEST_TIMEOUT_SECS", &mut config.server.request_timeout_secs)?;

    override_from(&lookup, "TUBE_UPSTREAM_BASE_URL", &mut config.upstream.base_url)?;
    override_from(&lookup, "TUBE_UPSTREAM_TIMEOUT_MS", &mut config.upstream.timeout_ms)?;
    override_from(&lookup, "TUBE_UPSTREAM_CONNECT_TIMEOUT_MS", &mut config.upstream.connect_timeout_ms)?;

    override_from(&lookup, "TUBE_CIRCUIT_BREAKER_FAILURE_THRESHOLD", &mut config.circuit_breaker.failure_threshold)?;
    override_from(&lookup, "TUBE_CIRCUIT_BREAKER_OPEN_DURATION_SECS", &mut config.circuit_breaker.open_duration_secs)?;
    override_from(&lookup, "TUBE_CIRCUIT_BREAKER_HALF_OPEN_PERMITS", &mut config.circuit_breaker.half_open_permits)?;

    override_from(&lookup, "TUBE_RETRY_MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
    override_from(&lookup, "TUBE_RETRY_BASE_DELAY_MS", &mut config.retry.base_delay_ms)?;

    override_from(&lookup, "TUBE_RATE_LIMIT_ENABLED", &mut config.rate_limit.enabled)?;
    override_from(&lookup, "TUBE_RATE_LIMIT_MAX_REQUESTS", &mut config.rate_limit.max_requests)?;
    override_from(&lookup, "TUBE_RATE_LIMIT_WINDOW_SECS", &mut config.rate_limit.window_secs)?;

    override_from(&lookup, "TUBE_OBSERVABILITY_LOG_LEVEL", &mut config.observability.log_level)?;
    override_from(&lookup, "TUBE_OBSERVABILITY_METRICS_ENABLED", &mut config.observability.metrics_enabled)?;
    override_from(&lookup, "TUBE_OBSERVABILITY_METRICS_ADDRESS", &mut config.observability.metrics_address)?;

    Ok(())
}

fn override_from<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
        tracing::debug!(var, "Config value overridden from environment");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        let lookup = lookup_from(&[
            ("TUBE_CIRCUIT_BREAKER_FAILURE_THRESHOLD", "7"),
            ("TUBE_RATE_LIMIT_ENABLED", "false"),
            ("TUBE_UPSTREAM_BASE_URL", "http://localhost:9000"),
        ]);

        apply_env_overrides(&mut config, lookup).unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 7);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.upstream.base_url, "http://localhost:9000");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_unparseable_env_value_is_an_error() {
        let mut config = AppConfig::default();
        let lookup = lookup_from(&[("TUBE_RETRY_MAX_ATTEMPTS", "many")]);

        let err = apply_env_overrides(&mut config, lookup).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "TUBE_RETRY_MAX_ATTEMPTS", .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("tube-status-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[retry]\nmax_attempts = 4\nbase_delay_ms = 10").unwrap();
        drop(file);

        let config = load_config(Some(&path)).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay_ms, 10);
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = ConfigError::Validation(vec![ValidationError {
            field: "retry.max_attempts",
            message: "must be >= 1".to_string(),
        }]);
        assert_eq!(err.to_string(), "Validation failed: retry.max_attempts: must be >= 1");
    }
}
