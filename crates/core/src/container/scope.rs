use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::container::container::Container;
use crate::container::descriptor::{ServiceDescriptor, ServiceInstance};
use crate::container::resolver::{downcast_service, Resolution};
use crate::errors::CoreError;

/// Per-scope cache of `Scoped` instances.
///
/// Entries are only read or written between resolutions; no shard lock is
/// held while a factory runs.
pub(crate) struct ScopeCache {
    id: Uuid,
    instances: DashMap<String, (Arc<ServiceDescriptor>, ServiceInstance)>,
}

impl ScopeCache {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            instances: DashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Cached instance for this exact descriptor, ignoring entries left by a replaced one
    pub(crate) fn get(&self, descriptor: &Arc<ServiceDescriptor>) -> Option<ServiceInstance> {
        self.instances
            .get(descriptor.name())
            .filter(|entry| Arc::ptr_eq(&entry.0, descriptor))
            .map(|entry| entry.1.clone())
    }

    /// Cache `built`, unless another resolution in this scope got there first
    pub(crate) fn store(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        built: ServiceInstance,
    ) -> ServiceInstance {
        match self.instances.entry(descriptor.name().to_string()) {
            Entry::Occupied(mut entry) => {
                if Arc::ptr_eq(&entry.get().0, descriptor) {
                    return entry.get().1.clone();
                }
                entry.insert((descriptor.clone(), built.clone()));
                built
            }
            Entry::Vacant(entry) => {
                entry.insert((descriptor.clone(), built.clone()));
                built
            }
        }
    }

    fn len(&self) -> usize {
        self.instances.len()
    }
}

/// A resolution scope, e.g. one per request.
///
/// `Scoped` services resolved through the scope are built once per scope and
/// dropped with it. Singletons and transients behave exactly as on the
/// container.
pub struct ServiceScope<'c> {
    container: &'c Container,
    cache: ScopeCache,
}

impl<'c> ServiceScope<'c> {
    pub(crate) fn new(container: &'c Container) -> Self {
        let scope = Self {
            container,
            cache: ScopeCache::new(),
        };
        tracing::debug!("Opened service scope {}", scope.cache.id);
        scope
    }

    pub fn id(&self) -> Uuid {
        self.cache.id
    }

    /// Resolve a service by name inside this scope
    pub fn resolve(&self, name: &str) -> Result<ServiceInstance, CoreError> {
        Resolution::scoped(self.container, &self.cache).resolve(name)
    }

    pub fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, CoreError> {
        downcast_service(name, self.resolve(name)?)
    }

    /// Number of scoped instances built in this scope so far
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl Drop for ServiceScope<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            "Closing service scope {} ({} scoped instances)",
            self.cache.id,
            self.cache.len()
        );
    }
}

impl fmt::Debug for ServiceScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("id", &self.cache.id)
            .field("cached_count", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerConfig, ScopedFallback};
    use crate::container::lifecycle::Lifecycle;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct RequestContext {
        serial: usize,
    }

    fn container_with_scoped_service() -> (Container, Arc<AtomicUsize>) {
        let container = Container::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let factory_counter = counter.clone();
        container
            .register("RequestContext", Lifecycle::Scoped, move || {
                Ok::<_, Infallible>(RequestContext {
                    serial: factory_counter.fetch_add(1, Ordering::SeqCst),
                })
            })
            .unwrap();
        (container, counter)
    }

    #[test]
    fn test_scoped_instance_shared_within_scope() {
        let (container, counter) = container_with_scoped_service();
        let scope = container.create_scope();

        let first = scope.resolve_typed::<RequestContext>("RequestContext").unwrap();
        let second = scope.resolve_typed::<RequestContext>("RequestContext").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scope.cached_count(), 1);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let (container, _) = container_with_scoped_service();
        let scope_a = container.create_scope();
        let scope_b = container.create_scope();

        let a = scope_a.resolve_typed::<RequestContext>("RequestContext").unwrap();
        let b = scope_b.resolve_typed::<RequestContext>("RequestContext").unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.serial, b.serial);
        assert_ne!(scope_a.id(), scope_b.id());
    }

    #[test]
    fn test_scoped_outside_scope_falls_back_to_transient() {
        let (container, counter) = container_with_scoped_service();

        let a = container.resolve("RequestContext").unwrap();
        let b = container.resolve("RequestContext").unwrap();

        assert!(!a.ptr_eq(&b));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scoped_outside_scope_rejected_when_configured() {
        let container = Container::with_config(
            ContainerConfig::default().with_scoped_fallback(ScopedFallback::Reject),
        );
        container
            .register("RequestContext", Lifecycle::Scoped, || {
                Ok::<_, Infallible>(RequestContext { serial: 0 })
            })
            .unwrap();

        assert!(matches!(
            container.resolve("RequestContext"),
            Err(CoreError::ScopeRequired { ref name }) if name == "RequestContext"
        ));
        assert!(container.create_scope().resolve("RequestContext").is_ok());
    }

    #[test]
    fn test_reregistration_invalidates_scope_entry() {
        let (container, _) = container_with_scoped_service();
        let scope = container.create_scope();

        let before = scope.resolve_typed::<RequestContext>("RequestContext").unwrap();
        container
            .register("RequestContext", Lifecycle::Scoped, || {
                Ok::<_, Infallible>(RequestContext { serial: 99 })
            })
            .unwrap();
        let after = scope.resolve_typed::<RequestContext>("RequestContext").unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.serial, 99);
    }
}
