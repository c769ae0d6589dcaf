use tracing::debug;

use super::CompilerPass;
use crate::{
    builder::ContainerBuilder,
    errors::{ContainerError, ContainerResult},
};

/// Fails compilation when the service graph contains a cycle.
///
/// Edges to lazy services are not followed, so a cycle broken by a lazy
/// proxy is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckCircularReferencesPass;

impl CompilerPass for CheckCircularReferencesPass {
    fn name(&self) -> &str {
        "CheckCircularReferencesPass"
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        let graph = builder.dependency_graph();
        if let Some(path) = graph.find_cycle() {
            return Err(ContainerError::CircularDependency { path });
        }
        debug!(services = graph.len(), "no circular references");
        Ok(())
    }
}
