use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::container::autowiring::{ErasedShape, InjectionPoint};
use crate::container::lifecycle::Lifecycle;
use crate::container::resolver::Resolution;
use crate::errors::BoxError;

/// Runtime identity of a Rust type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ServiceType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// Type-erased handle to a resolved service.
///
/// The handle stores the service's own `Arc<T>`, where `T` may be a trait
/// object such as `dyn Mailer`. Cloning the handle shares that `Arc`, so every
/// clone of a singleton points at the same value.
#[derive(Clone)]
pub struct ServiceInstance {
    handle: Arc<dyn Any + Send + Sync>,
    addr: usize,
    service_type: ServiceType,
}

impl ServiceInstance {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            addr: Arc::as_ptr(&value) as *const () as usize,
            handle: Arc::new(value),
            service_type: ServiceType::of::<T>(),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn type_name(&self) -> &'static str {
        self.service_type.type_name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.service_type.is::<T>()
    }

    /// Get a typed `Arc` to the value, sharing ownership with the container.
    ///
    /// `T` must be the type the service was registered as: a concrete type
    /// for `register*`, the trait object for `register_interface`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.handle.downcast_ref::<Arc<T>>().cloned()
    }

    pub fn downcast_ref<T: ?Sized + Send + Sync + 'static>(&self) -> Option<&T> {
        self.handle.downcast_ref::<Arc<T>>().map(|value| value.as_ref())
    }

    /// Check whether two handles refer to the same allocation
    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type", &self.service_type.type_name)
            .field("ptr", &(self.addr as *const ()))
            .finish()
    }
}

/// Factory function for creating service instances
pub type ServiceFactory =
    Box<dyn Fn(&Resolution<'_>) -> Result<ServiceInstance, BoxError> + Send + Sync>;

/// Strategy for activating/creating service instances
pub enum Activation {
    /// Service created via factory function
    Factory(ServiceFactory),
    /// Service created via auto-wiring against a shape
    AutoWired(Box<dyn ErasedShape>),
    /// Instance handed over at registration time
    Provided,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Factory(_) => "factory",
            Activation::AutoWired(_) => "autowired",
            Activation::Provided => "instance",
        }
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Factory(_) => write!(f, "Factory(<factory_fn>)"),
            Activation::AutoWired(shape) => write!(f, "AutoWired({})", shape.type_name()),
            Activation::Provided => write!(f, "Provided"),
        }
    }
}

/// The registry's record of how to build and cache one named service
pub struct ServiceDescriptor {
    name: String,
    lifecycle: Lifecycle,
    activation: Activation,
    pub(crate) instance: OnceLock<ServiceInstance>,
    declared_type: ServiceType,
}

impl ServiceDescriptor {
    pub(crate) fn factory(
        name: String,
        lifecycle: Lifecycle,
        declared_type: ServiceType,
        factory: ServiceFactory,
    ) -> Self {
        Self {
            name,
            lifecycle,
            activation: Activation::Factory(factory),
            instance: OnceLock::new(),
            declared_type,
        }
    }

    pub(crate) fn autowired(
        name: String,
        lifecycle: Lifecycle,
        declared_type: ServiceType,
        shape: Box<dyn ErasedShape>,
    ) -> Self {
        Self {
            name,
            lifecycle,
            activation: Activation::AutoWired(shape),
            instance: OnceLock::new(),
            declared_type,
        }
    }

    pub(crate) fn provided(name: String, instance: ServiceInstance) -> Self {
        let declared_type = instance.service_type();
        Self {
            name,
            lifecycle: Lifecycle::Singleton,
            activation: Activation::Provided,
            instance: OnceLock::from(instance),
            declared_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn declared_type(&self) -> ServiceType {
        self.declared_type
    }

    /// Cached singleton instance, if one has been built
    pub fn cached_instance(&self) -> Option<&ServiceInstance> {
        self.instance.get()
    }

    pub fn is_cached(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Injection points of an auto-wired service; empty for factories and instances
    pub fn dependencies(&self) -> &[InjectionPoint] {
        match &self.activation {
            Activation::AutoWired(shape) => shape.injection_points(),
            _ => &[],
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle)
            .field("activation", &self.activation)
            .field("cached", &self.is_cached())
            .field("declared_type", &self.declared_type.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Clock {
        offset: i64,
    }

    #[test]
    fn test_type_name_capture() {
        let id = ServiceType::of::<Clock>();
        assert!(id.type_name().contains("Clock"));
        assert!(id.is::<Clock>());
        assert!(!id.is::<String>());
        assert_eq!(ServiceType::of::<String>().type_name(), "alloc::string::String");
    }

    #[test]
    fn test_instance_downcast() {
        let instance = ServiceInstance::new(Clock { offset: 3 });

        assert!(instance.is::<Clock>());
        assert_eq!(instance.downcast_ref::<Clock>(), Some(&Clock { offset: 3 }));
        assert!(instance.downcast::<String>().is_none());

        let typed = instance.downcast::<Clock>().unwrap();
        assert_eq!(typed.offset, 3);
    }

    #[test]
    fn test_instance_identity() {
        let shared = Arc::new(Clock { offset: 0 });
        let a = ServiceInstance::from_arc(shared.clone());
        let b = a.clone();
        let c = ServiceInstance::new(Clock { offset: 0 });

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Arc::ptr_eq(&a.downcast::<Clock>().unwrap(), &shared));
    }

    trait Tick: Send + Sync {
        fn offset(&self) -> i64;
    }

    impl Tick for Clock {
        fn offset(&self) -> i64 {
            self.offset
        }
    }

    #[test]
    fn test_trait_object_instance() {
        let clock: Arc<dyn Tick> = Arc::new(Clock { offset: 9 });
        let instance = ServiceInstance::from_arc(clock.clone());

        assert!(instance.is::<dyn Tick>());
        assert!(instance.downcast::<Clock>().is_none());
        assert_eq!(instance.downcast_ref::<dyn Tick>().map(|tick| tick.offset()), Some(9));

        let shared = instance.downcast::<dyn Tick>().unwrap();
        assert!(Arc::ptr_eq(&shared, &clock));
        assert!(instance.ptr_eq(&ServiceInstance::from_arc(clock)));
    }

    #[test]
    fn test_provided_descriptor_is_cached_singleton() {
        let descriptor =
            ServiceDescriptor::provided("Clock".to_string(), ServiceInstance::new(Clock { offset: 1 }));

        assert_eq!(descriptor.lifecycle(), Lifecycle::Singleton);
        assert!(descriptor.is_cached());
        assert!(descriptor.declared_type().is::<Clock>());
        assert_eq!(descriptor.activation().as_str(), "instance");
        assert!(descriptor.dependencies().is_empty());
    }
}
