use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::ServiceInstance;
use crate::container::resolver::Resolution;
use crate::errors::CoreError;

/// One field of a shape that is filled from the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionPoint {
    /// Field name on the target type
    pub field: &'static str,
    /// Registered service name to resolve, matched exactly
    pub key: String,
    /// Leave the field empty instead of failing when `key` is not registered
    pub optional: bool,
}

type Assemble<T> = Box<dyn Fn(&Wiring) -> Result<T, CoreError> + Send + Sync>;

/// Explicit description of how to auto-wire a `T`.
///
/// Injection points are resolved in declaration order and handed to the
/// assembler through a [`Wiring`]. Fields the assembler fills on its own keep
/// whatever default it gives them.
///
/// ```ignore
/// let shape = Shape::new(|wiring| {
///     Ok(AuthService {
///         accounts: wiring.get("accounts")?,
///         mailer: wiring.get("mailer")?,
///         max_attempts: 5,
///     })
/// })
/// .inject("accounts", "AccountRepository")
/// .inject_optional("mailer", "Mailer");
/// ```
pub struct Shape<T> {
    type_name: &'static str,
    points: Vec<InjectionPoint>,
    assemble: Assemble<T>,
}

impl<T: Send + Sync + 'static> Shape<T> {
    pub fn new<F>(assemble: F) -> Self
    where
        F: Fn(&Wiring) -> Result<T, CoreError> + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            points: Vec::new(),
            assemble: Box::new(assemble),
        }
    }

    /// Declare a required dependency
    pub fn inject(mut self, field: &'static str, key: impl Into<String>) -> Self {
        self.points.push(InjectionPoint {
            field,
            key: key.into(),
            optional: false,
        });
        self
    }

    /// Declare a dependency that may be absent
    pub fn inject_optional(mut self, field: &'static str, key: impl Into<String>) -> Self {
        self.points.push(InjectionPoint {
            field,
            key: key.into(),
            optional: true,
        });
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.points
    }

    /// Reject shapes that could never wire correctly
    pub(crate) fn check(&self, service: &str) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for point in &self.points {
            if point.key.is_empty() {
                return Err(CoreError::invalid_provider_shape(
                    service,
                    format!("field '{}' has an empty injection key", point.field),
                ));
            }
            if !seen.insert(point.field) {
                return Err(CoreError::invalid_provider_shape(
                    service,
                    format!("field '{}' is declared more than once", point.field),
                ));
            }
        }
        Ok(())
    }

    /// Resolve every injection point, then assemble the value.
    ///
    /// Nothing is built unless all required points resolve and the assembler
    /// accepts their types.
    pub(crate) fn wire(&self, cx: &Resolution<'_>) -> Result<T, CoreError> {
        let mut wiring = Wiring {
            target: self.type_name,
            slots: Vec::with_capacity(self.points.len()),
        };

        for point in &self.points {
            let instance = match cx.resolve(&point.key) {
                Ok(instance) => Some(instance),
                Err(CoreError::ServiceNotFound { ref name })
                    if point.optional && *name == point.key =>
                {
                    tracing::trace!(
                        "Optional dependency '{}' of {} is not registered",
                        point.key,
                        self.type_name
                    );
                    None
                }
                Err(err) => return Err(err),
            };
            wiring.slots.push(Slot {
                field: point.field,
                key: point.key.clone(),
                instance,
            });
        }

        (self.assemble)(&wiring)
    }
}

impl<T> fmt::Debug for Shape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("type_name", &self.type_name)
            .field("points", &self.points)
            .finish()
    }
}

/// Type-erased shape stored in a descriptor
pub trait ErasedShape: Send + Sync {
    fn build(&self, cx: &Resolution<'_>) -> Result<ServiceInstance, CoreError>;

    fn type_name(&self) -> &'static str;

    fn injection_points(&self) -> &[InjectionPoint];
}

impl<T: Send + Sync + 'static> ErasedShape for Shape<T> {
    fn build(&self, cx: &Resolution<'_>) -> Result<ServiceInstance, CoreError> {
        self.wire(cx).map(ServiceInstance::new)
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn injection_points(&self) -> &[InjectionPoint] {
        &self.points
    }
}

struct Slot {
    field: &'static str,
    key: String,
    instance: Option<ServiceInstance>,
}

/// Resolved dependencies of one auto-wiring pass, keyed by field name
pub struct Wiring {
    target: &'static str,
    slots: Vec<Slot>,
}

impl Wiring {
    /// Take the value for `field`, converted to the field's declared type
    pub fn get<F: InjectField>(&self, field: &str) -> Result<F, CoreError> {
        let slot = self
            .slots
            .iter()
            .find(|slot| slot.field == field)
            .ok_or_else(|| {
                CoreError::invalid_provider_shape(
                    self.target,
                    format!("field '{}' has no injection point", field),
                )
            })?;

        F::from_resolved(slot.field, &slot.key, slot.instance.as_ref())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.field == field && slot.instance.is_some())
    }
}

impl fmt::Debug for Wiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.slots.iter().map(|slot| slot.field).collect();
        f.debug_struct("Wiring")
            .field("target", &self.target)
            .field("fields", &fields)
            .finish()
    }
}

/// Field types that can receive an injected service.
///
/// `Arc<U>` accepts a service registered as `U`, which may be a trait object
/// registered through `Container::register_interface` or `register_arc`.
pub trait InjectField: Sized {
    fn from_resolved(
        field: &str,
        key: &str,
        instance: Option<&ServiceInstance>,
    ) -> Result<Self, CoreError>;
}

impl<U: ?Sized + Send + Sync + 'static> InjectField for Arc<U> {
    fn from_resolved(
        field: &str,
        key: &str,
        instance: Option<&ServiceInstance>,
    ) -> Result<Self, CoreError> {
        let instance = instance.ok_or_else(|| CoreError::service_not_found(key))?;
        instance
            .downcast::<U>()
            .ok_or_else(|| CoreError::DependencyTypeMismatch {
                field: field.to_string(),
                key: key.to_string(),
                expected: std::any::type_name::<U>().to_string(),
                actual: instance.type_name().to_string(),
            })
    }
}

impl<U: ?Sized + Send + Sync + 'static> InjectField for Option<Arc<U>> {
    fn from_resolved(
        field: &str,
        key: &str,
        instance: Option<&ServiceInstance>,
    ) -> Result<Self, CoreError> {
        match instance {
            Some(instance) => Arc::<U>::from_resolved(field, key, Some(instance)).map(Some),
            None => Ok(None),
        }
    }
}

impl InjectField for ServiceInstance {
    fn from_resolved(
        _field: &str,
        key: &str,
        instance: Option<&ServiceInstance>,
    ) -> Result<Self, CoreError> {
        instance
            .cloned()
            .ok_or_else(|| CoreError::service_not_found(key))
    }
}

/// Types that describe their own auto-wiring, usually via `#[injectable]`
pub trait Injectable: Sized + Send + Sync + 'static {
    fn shape() -> Shape<Self>;

    /// Name used by `Container::register_injectable`
    fn service_name() -> String {
        default_service_name(std::any::type_name::<Self>())
    }
}

/// Derive a service name from a type path: the last segment, generics
/// removed, with a trailing `Impl` dropped (`repo::AccountRepositoryImpl`
/// becomes `AccountRepository`).
pub fn default_service_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let short = base.rsplit("::").next().unwrap_or(base);
    match short.strip_suffix("Impl") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => short.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Logger;

    struct Handler {
        logger: Arc<Logger>,
        retries: u32,
    }

    fn handler_shape() -> Shape<Handler> {
        Shape::new(|wiring| {
            Ok(Handler {
                logger: wiring.get("logger")?,
                retries: 3,
            })
        })
        .inject("logger", "Logger")
    }

    #[test]
    fn test_default_service_name() {
        assert_eq!(default_service_name("app::repo::AccountRepositoryImpl"), "AccountRepository");
        assert_eq!(default_service_name("app::Mailer"), "Mailer");
        assert_eq!(default_service_name("Impl"), "Impl");
        assert_eq!(default_service_name("app::Cache<app::Key>"), "Cache");
    }

    #[test]
    fn test_shape_metadata() {
        let shape = handler_shape();
        assert!(shape.type_name().contains("Handler"));
        assert_eq!(
            shape.injection_points(),
            &[InjectionPoint {
                field: "logger",
                key: "Logger".to_string(),
                optional: false,
            }]
        );
        assert!(shape.check("Handler").is_ok());
    }

    #[test]
    fn test_shape_check_rejects_empty_key() {
        let shape = handler_shape().inject("audit", "");
        assert!(matches!(
            shape.check("Handler"),
            Err(CoreError::InvalidProviderShape { .. })
        ));
    }

    #[test]
    fn test_shape_check_rejects_duplicate_field() {
        let shape = handler_shape().inject("logger", "OtherLogger");
        assert!(matches!(
            shape.check("Handler"),
            Err(CoreError::InvalidProviderShape { .. })
        ));
    }

    #[test]
    fn test_inject_field_conversions() {
        let logger = ServiceInstance::new(Logger);
        let number = ServiceInstance::new(7u32);

        let typed = Arc::<Logger>::from_resolved("logger", "Logger", Some(&logger));
        assert!(typed.is_ok());

        match Arc::<Logger>::from_resolved("logger", "Logger", Some(&number)) {
            Err(CoreError::DependencyTypeMismatch { field, actual, .. }) => {
                assert_eq!(field, "logger");
                assert_eq!(actual, "u32");
            }
            _ => panic!("expected DependencyTypeMismatch"),
        }

        let missing = Option::<Arc<Logger>>::from_resolved("logger", "Logger", None).unwrap();
        assert!(missing.is_none());

        assert!(matches!(
            Arc::<Logger>::from_resolved("logger", "Logger", None),
            Err(CoreError::ServiceNotFound { .. })
        ));

        let untyped = ServiceInstance::from_resolved("logger", "Logger", Some(&number)).unwrap();
        assert!(untyped.ptr_eq(&number));
    }

    trait Sink: Send + Sync {
        fn name(&self) -> &'static str;
    }

    impl Sink for Logger {
        fn name(&self) -> &'static str {
            "logger"
        }
    }

    #[test]
    fn test_inject_field_trait_object() {
        let sink: Arc<dyn Sink> = Arc::new(Logger);
        let instance = ServiceInstance::from_arc(sink.clone());

        let injected = Arc::<dyn Sink>::from_resolved("sink", "Sink", Some(&instance)).unwrap();
        assert!(Arc::ptr_eq(&injected, &sink));
        assert_eq!(injected.name(), "logger");

        // A concrete registration is not silently viewed through the trait
        let concrete = ServiceInstance::new(Logger);
        match Arc::<dyn Sink>::from_resolved("sink", "Sink", Some(&concrete)) {
            Err(CoreError::DependencyTypeMismatch { expected, .. }) => {
                assert!(expected.contains("Sink"));
            }
            _ => panic!("expected DependencyTypeMismatch"),
        }

        let absent = Option::<Arc<dyn Sink>>::from_resolved("sink", "Sink", None).unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn test_wiring_unknown_field() {
        let wiring = Wiring {
            target: "Handler",
            slots: Vec::new(),
        };
        assert!(matches!(
            wiring.get::<Arc<Logger>>("logger"),
            Err(CoreError::InvalidProviderShape { .. })
        ));
        assert!(!wiring.contains("logger"));
    }

    #[test]
    fn test_handler_defaults_survive() {
        let wiring = Wiring {
            target: "Handler",
            slots: vec![Slot {
                field: "logger",
                key: "Logger".to_string(),
                instance: Some(ServiceInstance::new(Logger)),
            }],
        };
        let handler = (handler_shape().assemble)(&wiring).unwrap();
        assert_eq!(handler.retries, 3);
        let _ = handler.logger;
    }
}
