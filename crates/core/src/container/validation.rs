use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::container::descriptor::ServiceDescriptor;
use crate::errors::CoreError;

/// One auto-wired edge: `field` of the owning service needs `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub field: &'static str,
    pub key: String,
    pub optional: bool,
}

/// Static view of the auto-wired dependencies between registered services.
///
/// Services registered through factories have no edges; their dependencies
/// only become visible while resolving.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, Vec<DependencyEdge>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from registry descriptors
    pub fn from_descriptors(descriptors: &[Arc<ServiceDescriptor>]) -> Self {
        let mut graph = Self::new();
        for descriptor in descriptors {
            let edges = descriptor
                .dependencies()
                .iter()
                .map(|point| DependencyEdge {
                    field: point.field,
                    key: point.key.clone(),
                    optional: point.optional,
                })
                .collect();
            graph.add_service(descriptor.name(), edges);
        }
        graph
    }

    pub fn add_service(&mut self, name: impl Into<String>, edges: Vec<DependencyEdge>) {
        self.nodes.insert(name.into(), edges);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&[DependencyEdge]> {
        self.nodes.get(name).map(Vec::as_slice)
    }

    /// Run every check and collect all problems found
    pub fn validate(&self) -> Result<(), Vec<CoreError>> {
        let mut errors = self.missing_dependencies();
        errors.extend(self.cycles());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Required edges whose key is not registered
    pub fn missing_dependencies(&self) -> Vec<CoreError> {
        let mut errors = Vec::new();
        for (service, edges) in &self.nodes {
            for edge in edges {
                if !edge.optional && !self.nodes.contains_key(&edge.key) {
                    errors.push(CoreError::MissingDependency {
                        service: service.clone(),
                        field: edge.field.to_string(),
                        key: edge.key.clone(),
                    });
                }
            }
        }
        errors
    }

    /// Every distinct cycle reachable through auto-wired edges, reported
    /// as `CircularDependency` paths that start and end on the same name
    pub fn cycles(&self) -> Vec<CoreError> {
        let mut errors = Vec::new();
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for name in self.nodes.keys() {
            if !visited.contains(name.as_str()) {
                self.detect_cycle(name, &mut visited, &mut on_stack, &mut path, &mut errors);
            }
        }
        errors
    }

    fn detect_cycle<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        errors: &mut Vec<CoreError>,
    ) {
        visited.insert(name);
        on_stack.insert(name);
        path.push(name);

        if let Some(edges) = self.nodes.get(name) {
            for edge in edges {
                let next = edge.key.as_str();
                if !self.nodes.contains_key(next) {
                    continue;
                }
                if on_stack.contains(next) {
                    // Back edge
                    let start = path.iter().position(|entry| *entry == next).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|entry| entry.to_string()).collect();
                    cycle.push(next.to_string());
                    errors.push(CoreError::CircularDependency { path: cycle });
                } else if !visited.contains(next) {
                    self.detect_cycle(next, visited, on_stack, path, errors);
                }
            }
        }

        on_stack.remove(name);
        path.pop();
    }
}
