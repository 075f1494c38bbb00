pub mod config;
pub mod container;
pub mod errors;

// Re-export key types for convenience
pub use config::{ConfigError, ContainerConfig, ScopedFallback};
pub use container::{
    Container, ContainerBuilder, ContainerReport, Injectable, Lifecycle, Provider, Resolution,
    ServiceInstance, ServiceScope, Shape, Wiring,
};
pub use errors::{BoxError, CoreError};

#[cfg(feature = "derive")]
pub use keystone_core_derive::injectable;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
