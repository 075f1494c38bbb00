use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;

use crate::config::ConfigError;

pub const ENV_MAX_RESOLUTION_DEPTH: &str = "KEYSTONE_MAX_RESOLUTION_DEPTH";
pub const ENV_SCOPED_FALLBACK: &str = "KEYSTONE_SCOPED_FALLBACK";
pub const ENV_CATCH_FACTORY_PANICS: &str = "KEYSTONE_CATCH_FACTORY_PANICS";

/// What the container does when a `Scoped` service is resolved outside any scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopedFallback {
    /// Build a fresh instance, exactly like `Transient`
    #[default]
    Transient,
    /// Fail with `CoreError::ScopeRequired`
    Reject,
}

impl FromStr for ScopedFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transient" => Ok(ScopedFallback::Transient),
            "reject" => Ok(ScopedFallback::Reject),
            _ => Err(ConfigError::invalid_value(
                "scoped_fallback",
                s,
                "transient or reject",
            )),
        }
    }
}

/// Runtime settings of a single container
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Longest resolution chain allowed before giving up
    pub max_resolution_depth: usize,
    pub scoped_fallback: ScopedFallback,
    /// Turn factory panics into `ConstructionFailed` instead of unwinding into the caller
    pub catch_factory_panics: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: 64,
            scoped_fallback: ScopedFallback::Transient,
            catch_factory_panics: true,
        }
    }
}

impl ContainerConfig {
    /// Load configuration from `KEYSTONE_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var(ENV_MAX_RESOLUTION_DEPTH) {
            config.max_resolution_depth = value.trim().parse().map_err(|_| {
                ConfigError::invalid_value("max_resolution_depth", &value, "a positive integer")
            })?;
        }

        if let Ok(value) = env::var(ENV_SCOPED_FALLBACK) {
            config.scoped_fallback = value.trim().parse()?;
        }

        if let Ok(value) = env::var(ENV_CATCH_FACTORY_PANICS) {
            config.catch_factory_panics = parse_bool(&value).ok_or_else(|| {
                ConfigError::invalid_value("catch_factory_panics", &value, "true or false")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document; missing keys take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::validation_failed(
                "max_resolution_depth must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn with_scoped_fallback(mut self, fallback: ScopedFallback) -> Self {
        self.scoped_fallback = fallback;
        self
    }

    pub fn with_catch_factory_panics(mut self, enabled: bool) -> Self {
        self.catch_factory_panics = enabled;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
