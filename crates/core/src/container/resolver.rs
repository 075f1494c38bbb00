use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::ScopedFallback;
use crate::container::container::Container;
use crate::container::descriptor::{Activation, ServiceDescriptor, ServiceFactory, ServiceInstance};
use crate::container::lifecycle::Lifecycle;
use crate::container::scope::ScopeCache;
use crate::errors::CoreError;

/// One name in the chain of nested resolutions.
///
/// Frames live on the stack of the `resolve` call that pushed them and link
/// back to their parent, so the chain follows the context wherever it is
/// handed, other threads included.
struct Frame<'a> {
    name: &'a str,
    parent: Option<&'a Frame<'a>>,
    depth: usize,
}

/// Live resolution context handed to factories and auto-wiring.
///
/// Resolving through it keeps cycle detection and the active scope intact.
#[derive(Clone, Copy)]
pub struct Resolution<'a> {
    container: &'a Container,
    scope: Option<&'a ScopeCache>,
    frame: Option<&'a Frame<'a>>,
}

impl<'a> Resolution<'a> {
    pub(crate) fn root(container: &'a Container) -> Self {
        Self {
            container,
            scope: None,
            frame: None,
        }
    }

    pub(crate) fn scoped(container: &'a Container, scope: &'a ScopeCache) -> Self {
        Self {
            container,
            scope: Some(scope),
            frame: None,
        }
    }

    /// Resolve a service by name
    pub fn resolve(&self, name: &str) -> Result<ServiceInstance, CoreError> {
        resolve_service(*self, name)
    }

    /// Resolve a service and check its runtime type
    pub fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, CoreError> {
        downcast_service(name, self.resolve(name)?)
    }

    /// Names being resolved in this chain, outermost first
    pub fn path(&self) -> Vec<String> {
        let mut path: Vec<String> = self.frames().map(|frame| frame.name.to_string()).collect();
        path.reverse();
        path
    }

    /// Number of nested resolutions this context sits in
    pub fn depth(&self) -> usize {
        self.frame.map_or(0, |frame| frame.depth)
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    fn frames(&self) -> impl Iterator<Item = &'a Frame<'a>> {
        std::iter::successors(self.frame, |frame| frame.parent)
    }

    fn is_resolving(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.name == name)
    }

    /// Same chain, without the scope
    fn unscoped(self) -> Self {
        Self {
            scope: None,
            ..self
        }
    }
}

impl fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("scope", &self.scope.map(ScopeCache::id))
            .field("path", &self.path())
            .finish()
    }
}

pub(crate) fn downcast_service<T: ?Sized + Send + Sync + 'static>(
    name: &str,
    instance: ServiceInstance,
) -> Result<Arc<T>, CoreError> {
    instance
        .downcast::<T>()
        .ok_or_else(|| CoreError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual: instance.type_name().to_string(),
        })
}

fn resolve_service(cx: Resolution<'_>, name: &str) -> Result<ServiceInstance, CoreError> {
    let config = cx.container.config();

    if cx.is_resolving(name) {
        let mut path = cx.path();
        path.push(name.to_string());
        return Err(CoreError::CircularDependency { path });
    }

    let depth = cx.depth();
    if depth >= config.max_resolution_depth {
        return Err(CoreError::ResolutionDepthExceeded {
            name: name.to_string(),
            depth: config.max_resolution_depth,
        });
    }

    let frame = Frame {
        name,
        parent: cx.frame,
        depth: depth + 1,
    };
    let cx = Resolution {
        container: cx.container,
        scope: cx.scope,
        frame: Some(&frame),
    };

    tracing::trace!("Resolving service '{}' at depth {}", name, frame.depth);

    let descriptor = cx
        .container
        .registry()
        .get(name)?
        .ok_or_else(|| CoreError::service_not_found(name))?;

    if let Some(instance) = descriptor.cached_instance() {
        return Ok(instance.clone());
    }

    match descriptor.lifecycle() {
        Lifecycle::Singleton => {
            // A singleton outlives any scope, so its dependencies never come from one
            let built = construct(cx.unscoped(), &descriptor)?;
            cx.container.registry().cache_singleton(&descriptor, built)
        }
        Lifecycle::Transient => construct(cx, &descriptor),
        Lifecycle::Scoped => match cx.scope {
            Some(scope) => {
                if let Some(instance) = scope.get(&descriptor) {
                    return Ok(instance);
                }
                let built = construct(cx, &descriptor)?;
                Ok(scope.store(&descriptor, built))
            }
            None => match config.scoped_fallback {
                ScopedFallback::Transient => {
                    tracing::debug!(
                        "Scoped service '{}' resolved outside a scope; building a transient instance",
                        name
                    );
                    construct(cx, &descriptor)
                }
                ScopedFallback::Reject => Err(CoreError::ScopeRequired {
                    name: name.to_string(),
                }),
            },
        },
    }
}

fn construct(
    cx: Resolution<'_>,
    descriptor: &Arc<ServiceDescriptor>,
) -> Result<ServiceInstance, CoreError> {
    match descriptor.activation() {
        Activation::Factory(factory) => invoke_factory(cx, descriptor.name(), factory),
        Activation::AutoWired(shape) => shape.build(&cx),
        Activation::Provided => descriptor.cached_instance().cloned().ok_or_else(|| {
            CoreError::invalid_provider_shape(descriptor.name(), "registered instance is missing")
        }),
    }
}

fn invoke_factory(
    cx: Resolution<'_>,
    name: &str,
    factory: &ServiceFactory,
) -> Result<ServiceInstance, CoreError> {
    let result = if cx.container.config().catch_factory_panics {
        match panic::catch_unwind(AssertUnwindSafe(|| factory(&cx))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("Factory for '{}' panicked: {}", name, message);
                return Err(CoreError::construction_failed(
                    name,
                    format!("factory panicked: {}", message),
                ));
            }
        }
    } else {
        factory(&cx)
    };

    result.map_err(|source| CoreError::construction_failed(name, source))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use std::convert::Infallible;
    use std::thread;

    fn chain(container: &Container, names: &[&'static str]) {
        for pair in names.windows(2) {
            let next = pair[1];
            container
                .register_with(pair[0], Lifecycle::Transient, move |cx: &Resolution<'_>| {
                    cx.resolve(next).map(|_| ())
                })
                .unwrap();
        }
    }

    #[test]
    fn test_revisit_reports_path() {
        let container = Container::new();
        chain(&container, &["A", "B", "C", "B"]);

        let err = container.resolve("A").unwrap_err();
        match err.root_cause() {
            CoreError::CircularDependency { path } => assert_eq!(path, &["A", "B", "C", "B"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let container =
            Container::with_config(ContainerConfig::default().with_max_resolution_depth(2));
        chain(&container, &["A", "B", "C"]);
        container
            .register("C", Lifecycle::Transient, || Ok::<_, Infallible>(()))
            .unwrap();

        let err = container.resolve("A").unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CoreError::ResolutionDepthExceeded { depth: 2, name } if name == "C"
        ));
        assert!(container.resolve("B").is_ok());
    }

    #[test]
    fn test_zero_depth_rejects_every_resolution() {
        let container =
            Container::with_config(ContainerConfig::default().with_max_resolution_depth(0));
        container.register_instance("Answer", 42u8).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                container.resolve("Answer"),
                Err(CoreError::ResolutionDepthExceeded { depth: 0, .. })
            ));
        }
        assert!(container.is_registered("Answer"));
    }

    #[test]
    fn test_path_is_visible_to_factories() {
        let container = Container::new();
        container
            .register_with("Outer", Lifecycle::Transient, |cx: &Resolution<'_>| {
                cx.resolve_typed::<Vec<String>>("Inner").map(|path| (*path).clone())
            })
            .unwrap();
        container
            .register_with("Inner", Lifecycle::Transient, |cx: &Resolution<'_>| {
                Ok::<_, Infallible>(cx.path())
            })
            .unwrap();

        let path = container.resolve_typed::<Vec<String>>("Outer").unwrap();
        assert_eq!(*path, vec!["Outer", "Inner"]);
        assert_eq!(Resolution::root(&container).depth(), 0);
    }

    #[test]
    fn test_chain_follows_context_to_other_threads() {
        let container = Container::new();
        container
            .register_with("Worker", Lifecycle::Transient, |cx: &Resolution<'_>| {
                thread::scope(|s| s.spawn(|| cx.resolve("Worker")).join().unwrap()).map(|_| ())
            })
            .unwrap();

        let err = container.resolve("Worker").unwrap_err();
        match err.root_cause() {
            CoreError::CircularDependency { path } => assert_eq!(path, &["Worker", "Worker"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
