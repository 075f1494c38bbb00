use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::container::autowiring::{Injectable, Shape};
use crate::container::container::Container;
use crate::container::lifecycle::Lifecycle;
use crate::container::resolver::Resolution;
use crate::errors::{BoxError, CoreError};

type Registration = Box<dyn FnOnce(&Container) -> Result<(), CoreError>>;

/// Builder for constructing containers with services.
///
/// Registrations are applied in the order they were added, so a later
/// registration under the same name wins.
pub struct ContainerBuilder {
    config: ContainerConfig,
    registrations: Vec<Registration>,
    validate: bool,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            registrations: Vec::new(),
            validate: false,
        }
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run `Container::validate` before handing out the container
    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    pub fn add_factory<T, E, F>(mut self, name: impl Into<String>, lifecycle: Lifecycle, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations
            .push(Box::new(move |container: &Container| container.register(name, lifecycle, factory)));
        self
    }

    pub fn add_singleton<T, E, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.add_factory(name, Lifecycle::Singleton, factory)
    }

    pub fn add_transient<T, E, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.add_factory(name, Lifecycle::Transient, factory)
    }

    pub fn add_scoped<T, E, F>(self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.add_factory(name, Lifecycle::Scoped, factory)
    }

    /// Add a factory that resolves its own dependencies
    pub fn add_with<T, E, F>(mut self, name: impl Into<String>, lifecycle: Lifecycle, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn(&Resolution<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations
            .push(Box::new(move |container: &Container| container.register_with(name, lifecycle, factory)));
        self
    }

    pub fn add_instance<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        let name = name.into();
        let value = Arc::new(value);
        self.registrations
            .push(Box::new(move |container: &Container| container.register_arc(name, value)));
        self
    }

    pub fn add_shape<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        lifecycle: Lifecycle,
        shape: Shape<T>,
    ) -> Self {
        let name = name.into();
        self.registrations
            .push(Box::new(move |container: &Container| container.register_shape(name, lifecycle, shape)));
        self
    }

    pub fn add_injectable<T: Injectable>(mut self, lifecycle: Lifecycle) -> Self {
        self.registrations.push(Box::new(move |container: &Container| {
            container.register_injectable::<T>(lifecycle).map(|_| ())
        }));
        self
    }

    /// Configure the builder from a configuration closure
    pub fn configure<F>(self, configure: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        configure(self)
    }

    /// Build the container, applying every registration in order.
    ///
    /// With validation enabled, all problems are reported at once, the first
    /// one as the error and the rest in the log.
    pub fn build(self) -> Result<Container, CoreError> {
        self.config.validate()?;
        let container = Container::with_config(self.config);

        for register in self.registrations {
            register(&container)?;
        }

        if self.validate {
            if let Err(errors) = container.validate() {
                for error in errors.iter().skip(1) {
                    tracing::warn!("Container validation: {}", error);
                }
                if let Some(first) = errors.into_iter().next() {
                    return Err(first);
                }
            }
        }

        tracing::debug!("Built container with {} services", container.len());
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
