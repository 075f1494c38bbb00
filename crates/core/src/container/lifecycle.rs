use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How long a resolved service instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// One instance per container, built on first resolution
    #[default]
    Singleton,
    /// Fresh instance on every resolution
    Transient,
    /// One instance per `ServiceScope`
    Scoped,
}

impl Lifecycle {
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifecycle::Singleton)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Lifecycle::Transient)
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Lifecycle::Scoped)
    }

    /// Get the lifecycle name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Singleton => "singleton",
            Lifecycle::Transient => "transient",
            Lifecycle::Scoped => "scoped",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Lifecycle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(Lifecycle::Singleton),
            "transient" => Ok(Lifecycle::Transient),
            "scoped" => Ok(Lifecycle::Scoped),
            _ => Err(ConfigError::invalid_value(
                "lifecycle",
                s,
                "singleton, transient or scoped",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_from_str() {
        assert_eq!("singleton".parse::<Lifecycle>().unwrap(), Lifecycle::Singleton);
        assert_eq!("Transient".parse::<Lifecycle>().unwrap(), Lifecycle::Transient);
        assert_eq!("SCOPED".parse::<Lifecycle>().unwrap(), Lifecycle::Scoped);

        assert!("request".parse::<Lifecycle>().is_err());
    }

    #[test]
    fn test_lifecycle_display_matches_serde() {
        for lifecycle in [Lifecycle::Singleton, Lifecycle::Transient, Lifecycle::Scoped] {
            let yaml = serde_yaml::to_string(&lifecycle).unwrap();
            assert_eq!(yaml.trim(), lifecycle.to_string());
        }
    }
}
