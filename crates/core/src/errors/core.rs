use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error returned by user factories
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for the keystone container
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid provider shape for '{name}': {message}")]
    InvalidProviderShape { name: String, message: String },

    #[error("Service not found: {name}")]
    ServiceNotFound { name: String },

    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("Construction of '{name}' failed: {source}")]
    ConstructionFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Service '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Field '{field}' expects {expected} but '{key}' resolved to {actual}")]
    DependencyTypeMismatch {
        field: String,
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Service '{service}' field '{field}' depends on unregistered '{key}'")]
    MissingDependency {
        service: String,
        field: String,
        key: String,
    },

    #[error("Scoped service '{name}' must be resolved through a scope")]
    ScopeRequired { name: String },

    #[error("Resolution of '{name}' exceeded the maximum depth of {depth}")]
    ResolutionDepthExceeded { name: String, depth: usize },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new invalid provider shape error
    pub fn invalid_provider_shape(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProviderShape {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new service not found error
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::ServiceNotFound { name: name.into() }
    }

    /// Wrap a factory failure
    pub fn construction_failed(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ConstructionFailed {
            name: name.into(),
            source: source.into(),
        }
    }

    pub(crate) fn lock(resource: &str) -> Self {
        Self::LockError {
            resource: resource.to_string(),
        }
    }

    /// Check if the error is a missing service
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Check if the error is a dependency cycle
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error is either kind of type mismatch
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::DependencyTypeMismatch { .. }
        )
    }

    /// Follow nested `ConstructionFailed` errors down to the innermost container error.
    ///
    /// Factories registered with `register_with` resolve their own dependencies, so a
    /// cycle or missing service several levels down arrives wrapped once per factory.
    pub fn root_cause(&self) -> &CoreError {
        let mut current = self;
        while let Self::ConstructionFailed { source, .. } = current {
            match source.downcast_ref::<CoreError>() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_path_display() {
        let err = CoreError::CircularDependency {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
        assert!(err.is_circular());
    }

    #[test]
    fn test_root_cause_unwraps_nested_construction_failures() {
        let inner = CoreError::service_not_found("Database");
        let middle = CoreError::construction_failed("Repository", inner);
        let outer = CoreError::construction_failed("UserService", middle);

        assert!(outer.root_cause().is_not_found());
    }

    #[test]
    fn test_root_cause_stops_at_foreign_error() {
        let err = CoreError::construction_failed("Mailer", "smtp host unreachable");

        match err.root_cause() {
            CoreError::ConstructionFailed { name, source } => {
                assert_eq!(name, "Mailer");
                assert_eq!(source.to_string(), "smtp host unreachable");
            }
            other => panic!("unexpected root cause: {other:?}"),
        }
    }
}
