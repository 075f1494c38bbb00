use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::container::descriptor::{ServiceDescriptor, ServiceInstance};
use crate::errors::CoreError;

/// Registry mapping service names to their descriptors.
///
/// A single reader/writer lock guards the map. It is never held while user
/// code runs, so factories may resolve other services freely.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<ServiceDescriptor>>>,
}

impl ServiceRegistry {
    /// Create a new service registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor under its own name, returning the one it replaced
    pub(crate) fn insert(
        &self,
        descriptor: ServiceDescriptor,
    ) -> Result<Option<Arc<ServiceDescriptor>>, CoreError> {
        let mut services = self
            .services
            .write()
            .map_err(|_| CoreError::lock("service_registry"))?;

        let name = descriptor.name().to_string();
        Ok(services.insert(name, Arc::new(descriptor)))
    }

    /// Look up a descriptor by name
    pub fn get(&self, name: &str) -> Result<Option<Arc<ServiceDescriptor>>, CoreError> {
        let services = self
            .services
            .read()
            .map_err(|_| CoreError::lock("service_registry"))?;

        Ok(services.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services
            .read()
            .map(|services| services.contains_key(name))
            .unwrap_or(false)
    }

    /// Get all registered names, sorted
    pub fn names(&self) -> BTreeSet<String> {
        self.services
            .read()
            .map(|services| services.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.services
            .read()
            .map(|services| services.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every descriptor, sorted by name
    pub fn descriptors(&self) -> Result<Vec<Arc<ServiceDescriptor>>, CoreError> {
        let services = self
            .services
            .read()
            .map_err(|_| CoreError::lock("service_registry"))?;

        let mut descriptors: Vec<_> = services.values().cloned().collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(descriptors)
    }

    /// Remove a descriptor, reporting whether one was present
    pub(crate) fn remove(&self, name: &str) -> bool {
        let mut services = self
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        services.remove(name).is_some()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut services = self
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let count = services.len();
        services.clear();
        count
    }

    /// Store a freshly built singleton instance.
    ///
    /// The write lock serializes this against removal and re-registration.
    /// When the descriptor is no longer the registered one the value is
    /// handed back uncached. When another thread cached first, its value wins
    /// and `built` is dropped.
    pub(crate) fn cache_singleton(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        built: ServiceInstance,
    ) -> Result<ServiceInstance, CoreError> {
        let services = self
            .services
            .write()
            .map_err(|_| CoreError::lock("service_registry"))?;

        let still_registered = services
            .get(descriptor.name())
            .is_some_and(|current| Arc::ptr_eq(current, descriptor));

        if !still_registered {
            tracing::warn!(
                "Descriptor for '{}' was replaced during construction; instance not cached",
                descriptor.name()
            );
            return Ok(built);
        }

        let cached = descriptor.instance.get_or_init(|| built.clone());
        if cached.ptr_eq(&built) {
            tracing::debug!("Cached singleton '{}'", descriptor.name());
        } else {
            tracing::debug!(
                "Singleton '{}' was cached concurrently; discarding duplicate instance",
                descriptor.name()
            );
        }

        Ok(cached.clone())
    }
}
