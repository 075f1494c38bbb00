use serde::Serialize;
use std::fmt;

use crate::container::autowiring::InjectionPoint;
use crate::container::descriptor::ServiceDescriptor;
use crate::container::lifecycle::Lifecycle;
use crate::errors::CoreError;

/// Diagnostic view of one registration
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub activation: &'static str,
    pub declared_type: &'static str,
    pub cached: bool,
    pub dependencies: Vec<InjectionPoint>,
}

impl ServiceReport {
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            lifecycle: descriptor.lifecycle(),
            activation: descriptor.activation().as_str(),
            declared_type: descriptor.declared_type().type_name(),
            cached: descriptor.is_cached(),
            dependencies: descriptor.dependencies().to_vec(),
        }
    }
}

/// Snapshot of a container's registrations, sorted by name
#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub total_services: usize,
    pub singletons: usize,
    pub transients: usize,
    pub scoped: usize,
    pub services: Vec<ServiceReport>,
}

impl ContainerReport {
    pub fn new(services: Vec<ServiceReport>) -> Self {
        let count = |lifecycle: Lifecycle| {
            services
                .iter()
                .filter(|service| service.lifecycle == lifecycle)
                .count()
        };

        Self {
            total_services: services.len(),
            singletons: count(Lifecycle::Singleton),
            transients: count(Lifecycle::Transient),
            scoped: count(Lifecycle::Scoped),
            services,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} services ({} singleton, {} transient, {} scoped)",
            self.total_services, self.singletons, self.transients, self.scoped
        )?;

        for service in &self.services {
            write!(
                f,
                "  {} [{}, {}] {}",
                service.name, service.lifecycle, service.activation, service.declared_type
            )?;
            if service.cached {
                write!(f, " (cached)")?;
            }
            writeln!(f)?;

            for point in &service.dependencies {
                let marker = if point.optional { "?" } else { "" };
                writeln!(f, "    {} <- {}{}", point.field, point.key, marker)?;
            }
        }
        Ok(())
    }
}
