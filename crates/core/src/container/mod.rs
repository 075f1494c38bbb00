#[allow(clippy::module_inception)]
pub mod container;
pub mod autowiring;
pub mod builder;
pub mod descriptor;
pub mod lifecycle;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod scope;
pub mod validation;


pub use autowiring::{default_service_name, ErasedShape, InjectField, Injectable, InjectionPoint, Shape, Wiring};
pub use builder::ContainerBuilder;
pub use container::{Container, Provider};
pub use descriptor::{Activation, ServiceDescriptor, ServiceFactory, ServiceInstance, ServiceType};
pub use lifecycle::Lifecycle;
pub use registry::ServiceRegistry;
pub use report::{ContainerReport, ServiceReport};
pub use resolver::Resolution;
pub use scope::ServiceScope;
pub use validation::{DependencyEdge, DependencyGraph};
