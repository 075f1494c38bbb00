use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::container::autowiring::{default_service_name, Injectable, Shape};
use crate::container::descriptor::{ServiceDescriptor, ServiceFactory, ServiceInstance, ServiceType};
use crate::container::lifecycle::Lifecycle;
use crate::container::registry::ServiceRegistry;
use crate::container::report::{ContainerReport, ServiceReport};
use crate::container::resolver::{downcast_service, Resolution};
use crate::container::scope::ServiceScope;
use crate::container::validation::DependencyGraph;
use crate::errors::{BoxError, CoreError};

/// How a singleton registered through [`Container::singleton`] gets built
pub enum Provider<T> {
    /// Zero-argument constructor
    Factory(Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>),
    /// Auto-wired from a shape
    Shape(Shape<T>),
}

impl<T: Send + Sync + 'static> Provider<T> {
    pub fn factory<E, F>(factory: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Provider::Factory(Box::new(move || factory().map_err(Into::into)))
    }

    pub fn shape(shape: Shape<T>) -> Self {
        Provider::Shape(shape)
    }
}

impl<T: Send + Sync + 'static> From<Shape<T>> for Provider<T> {
    fn from(shape: Shape<T>) -> Self {
        Provider::Shape(shape)
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Factory(_) => write!(f, "Factory(<factory_fn>)"),
            Provider::Shape(shape) => write!(f, "Shape({:?})", shape),
        }
    }
}

/// Main dependency injection container.
///
/// Every method takes `&self`; wrap the container in an `Arc` to share it
/// between threads.
pub struct Container {
    registry: ServiceRegistry,
    config: ContainerConfig,
}

impl Container {
    /// Create an empty container with the default configuration
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            registry: ServiceRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Register a service built by a zero-argument factory.
    ///
    /// Registering a name again replaces the previous descriptor and drops
    /// its cached instance.
    pub fn register<T, E, F>(
        &self,
        name: impl Into<String>,
        lifecycle: Lifecycle,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.register_with(name, lifecycle, move |_: &Resolution<'_>| factory())
    }

    /// Register a service whose factory resolves its own dependencies
    pub fn register_with<T, E, F>(
        &self,
        name: impl Into<String>,
        lifecycle: Lifecycle,
        factory: F,
    ) -> Result<(), CoreError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn(&Resolution<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.register_interface::<T, E, _>(name, lifecycle, move |cx: &Resolution<'_>| {
            factory(cx).map(Arc::new)
        })
    }

    /// Register a service under an interface type, usually a trait object.
    ///
    /// Resolution and injection see the value as `Arc<I>`, so a field declared
    /// as `Arc<dyn Mailer>` can be filled from this registration.
    ///
    /// ```ignore
    /// container.register_interface("Mailer", Lifecycle::Singleton, |_: &Resolution<'_>| {
    ///     Ok::<Arc<dyn Mailer>, Infallible>(Arc::new(SmtpMailer::default()))
    /// })?;
    /// ```
    pub fn register_interface<I, E, F>(
        &self,
        name: impl Into<String>,
        lifecycle: Lifecycle,
        factory: F,
    ) -> Result<(), CoreError>
    where
        I: ?Sized + Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn(&Resolution<'_>) -> Result<Arc<I>, E> + Send + Sync + 'static,
    {
        let name = checked_name(name.into())?;
        let factory: ServiceFactory = Box::new(move |cx: &Resolution<'_>| {
            factory(cx).map(ServiceInstance::from_arc).map_err(Into::into)
        });

        self.insert(ServiceDescriptor::factory(
            name,
            lifecycle,
            ServiceType::of::<I>(),
            factory,
        ))
    }

    /// Register an already-built value as a singleton
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), CoreError> {
        self.register_arc(name, Arc::new(value))
    }

    /// Register a shared value as a singleton; resolution hands out this exact `Arc`.
    ///
    /// `T` may be a trait object, e.g. `Arc<dyn Clock>`.
    pub fn register_arc<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Result<(), CoreError> {
        let name = checked_name(name.into())?;
        self.insert(ServiceDescriptor::provided(
            name,
            ServiceInstance::from_arc(value),
        ))
    }

    /// Register a service built by auto-wiring against `shape`
    pub fn register_shape<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        lifecycle: Lifecycle,
        shape: Shape<T>,
    ) -> Result<(), CoreError> {
        let name = checked_name(name.into())?;
        shape.check(&name)?;

        self.insert(ServiceDescriptor::autowired(
            name,
            lifecycle,
            ServiceType::of::<T>(),
            Box::new(shape),
        ))
    }

    /// Register an [`Injectable`] type under its own service name, which is returned
    pub fn register_injectable<T: Injectable>(
        &self,
        lifecycle: Lifecycle,
    ) -> Result<String, CoreError> {
        let name = T::service_name();
        self.register_shape(name.clone(), lifecycle, T::shape())?;
        Ok(name)
    }

    /// Register a factory under the name derived from the type it produces
    /// (see [`default_service_name`]), returning that name
    pub fn register_typed<T, E, F>(&self, lifecycle: Lifecycle, factory: F) -> Result<String, CoreError>
    where
        T: Send + Sync + 'static,
        E: Into<BoxError>,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let name = default_service_name(std::any::type_name::<T>());
        self.register(name.clone(), lifecycle, factory)?;
        Ok(name)
    }

    /// Register a singleton from either a factory or a shape
    pub fn singleton<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        provider: impl Into<Provider<T>>,
    ) -> Result<(), CoreError> {
        match provider.into() {
            Provider::Factory(factory) => {
                self.register(name, Lifecycle::Singleton, move || factory())
            }
            Provider::Shape(shape) => self.register_shape(name, Lifecycle::Singleton, shape),
        }
    }

    fn insert(&self, descriptor: ServiceDescriptor) -> Result<(), CoreError> {
        let name = descriptor.name().to_string();
        let lifecycle = descriptor.lifecycle();
        let activation = descriptor.activation().as_str();

        match self.registry.insert(descriptor)? {
            Some(_) => tracing::debug!(
                "Replaced service '{}' ({}, {})",
                name,
                lifecycle,
                activation
            ),
            None => tracing::debug!(
                "Registered service '{}' ({}, {})",
                name,
                lifecycle,
                activation
            ),
        }
        Ok(())
    }

    /// Resolve a service by name
    pub fn resolve(&self, name: &str) -> Result<ServiceInstance, CoreError> {
        Resolution::root(self).resolve(name)
    }

    /// Resolve a service by name and check its runtime type
    pub fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, CoreError> {
        downcast_service(name, self.resolve(name)?)
    }

    /// Resolve a service or panic; meant for startup wiring where a missing
    /// service is unrecoverable
    pub fn must_resolve(&self, name: &str) -> ServiceInstance {
        match self.resolve(name) {
            Ok(instance) => instance,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn must_resolve_typed<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Arc<T> {
        match self.resolve_typed::<T>(name) {
            Ok(service) => service,
            Err(err) => panic!("{}", err),
        }
    }

    /// Build a fresh, unregistered `T` by auto-wiring its dependencies
    pub fn autowire<T: Injectable>(&self) -> Result<T, CoreError> {
        let shape = T::shape();
        shape.check(shape.type_name())?;
        shape.wire(&Resolution::root(self))
    }

    /// Open a resolution scope for `Scoped` services
    pub fn create_scope(&self) -> ServiceScope<'_> {
        ServiceScope::new(self)
    }

    /// Check if a service is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// All registered names, sorted
    pub fn list_registered(&self) -> BTreeSet<String> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Remove a service; returns whether it was registered
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.registry.remove(name);
        if removed {
            tracing::debug!("Removed service '{}'", name);
        }
        removed
    }

    /// Remove every service
    pub fn clear(&self) {
        let count = self.registry.clear();
        tracing::debug!("Cleared {} services", count);
    }

    /// Statically check auto-wired services: required keys must be registered
    /// and auto-wired edges must not form a cycle.
    ///
    /// Factories registered with `register_with` are opaque and only fail at
    /// resolution time.
    pub fn validate(&self) -> Result<(), Vec<CoreError>> {
        let descriptors = self.registry.descriptors().map_err(|err| vec![err])?;
        DependencyGraph::from_descriptors(&descriptors).validate()
    }

    /// Snapshot of every registration for diagnostics
    pub fn report(&self) -> Result<ContainerReport, CoreError> {
        let services = self
            .registry
            .descriptors()?
            .iter()
            .map(|descriptor| ServiceReport::from_descriptor(descriptor))
            .collect();
        Ok(ContainerReport::new(services))
    }
}

fn checked_name(name: String) -> Result<String, CoreError> {
    if name.is_empty() {
        return Err(CoreError::invalid_provider_shape(
            name,
            "service name must not be empty",
        ));
    }
    Ok(name)
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
