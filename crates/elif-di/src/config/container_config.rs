use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::config::ConfigError;

pub const ENV_STARTUP_TIMEOUT_MS: &str = "ELIF_DI_STARTUP_TIMEOUT_MS";
pub const ENV_FINALIZER_TIMEOUT_MS: &str = "ELIF_DI_FINALIZER_TIMEOUT_MS";
pub const ENV_VALIDATE_ON_STARTUP: &str = "ELIF_DI_VALIDATE_ON_STARTUP";

/// Runtime settings for a [`Container`](crate::Container)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Upper bound for resolving each eager-startup service, in milliseconds
    pub startup_timeout_ms: Option<u64>,
    /// Upper bound for running each finalizer, in milliseconds
    pub finalizer_timeout_ms: Option<u64>,
    /// Run [`Container::validate`](crate::Container::validate) before eager startup
    pub validate_on_startup: bool,
}

impl ContainerConfig {
    /// Create a configuration with no timeouts and no startup validation
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_finalizer_timeout(mut self, timeout: Duration) -> Self {
        self.finalizer_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_on_startup = enabled;
        self
    }

    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout_ms.map(Duration::from_millis)
    }

    pub fn finalizer_timeout(&self) -> Option<Duration> {
        self.finalizer_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from `ELIF_DI_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(value) = lookup(ENV_STARTUP_TIMEOUT_MS) {
            config.startup_timeout_ms = Some(parse_millis(ENV_STARTUP_TIMEOUT_MS, &value)?);
        }

        if let Some(value) = lookup(ENV_FINALIZER_TIMEOUT_MS) {
            config.finalizer_timeout_ms = Some(parse_millis(ENV_FINALIZER_TIMEOUT_MS, &value)?);
        }

        if let Some(value) = lookup(ENV_VALIDATE_ON_STARTUP) {
            config.validate_on_startup = parse_flag(ENV_VALIDATE_ON_STARTUP, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.startup_timeout_ms == Some(0) {
            return Err(ConfigError::validation_failed(
                "startup_timeout_ms must be greater than zero",
            ));
        }

        if self.finalizer_timeout_ms == Some(0) {
            return Err(ConfigError::validation_failed(
                "finalizer_timeout_ms must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn parse_millis(field: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, value, "duration in milliseconds"))
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::new();
        assert_eq!(config.startup_timeout(), None);
        assert_eq!(config.finalizer_timeout(), None);
        assert!(!config.validate_on_startup);
    }

    #[test]
    fn test_from_lookup() {
        let config = ContainerConfig::from_lookup(lookup_from(&[
            (ENV_STARTUP_TIMEOUT_MS, "1500"),
            (ENV_VALIDATE_ON_STARTUP, "yes"),
        ]))
        .unwrap();

        assert_eq!(config.startup_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.finalizer_timeout(), None);
        assert!(config.validate_on_startup);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = ContainerConfig::from_lookup(lookup_from(&[(ENV_FINALIZER_TIMEOUT_MS, "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = ContainerConfig::from_lookup(lookup_from(&[(ENV_STARTUP_TIMEOUT_MS, "0")]));
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));

        let result = ContainerConfig::from_lookup(lookup_from(&[(ENV_VALIDATE_ON_STARTUP, "maybe")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_yaml_and_json() {
        let config = ContainerConfig::from_yaml_str("finalizer_timeout_ms: 250\n").unwrap();
        assert_eq!(config.finalizer_timeout(), Some(Duration::from_millis(250)));
        assert!(!config.validate_on_startup);

        let config =
            ContainerConfig::from_json_str(r#"{"validate_on_startup": true, "startup_timeout_ms": 10}"#)
                .unwrap();
        assert!(config.validate_on_startup);
        assert_eq!(config.startup_timeout(), Some(Duration::from_millis(10)));

        assert!(ContainerConfig::from_json_str("{").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var(ENV_FINALIZER_TIMEOUT_MS, "42");
        env::remove_var(ENV_STARTUP_TIMEOUT_MS);
        env::remove_var(ENV_VALIDATE_ON_STARTUP);

        let config = ContainerConfig::from_env().unwrap();
        assert_eq!(config.finalizer_timeout(), Some(Duration::from_millis(42)));

        env::remove_var(ENV_FINALIZER_TIMEOUT_MS);
    }
}
