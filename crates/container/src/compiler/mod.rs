//! Compiler passes.
//!
//! A pass runs exactly once, during [`ContainerBuilder::compile`], and may
//! read or rewrite the definition registry. User passes run in registration
//! order, followed by the built-in passes returned by [`default_passes`].

use std::any::type_name;

use crate::{builder::ContainerBuilder, errors::ContainerResult};

pub mod autowire_pass;
pub mod check_definitions;
pub mod child_definitions;
pub mod circular_references;
pub mod tagged;

pub use autowire_pass::AutowirePass;
pub use check_definitions::CheckDefinitionsPass;
pub use child_definitions::ResolveChildDefinitionsPass;
pub use circular_references::CheckCircularReferencesPass;
pub use tagged::{sort_by_priority, TaggedService, TaggedServicesPass};

pub trait CompilerPass: Send + Sync {
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()>;
}

impl<F> CompilerPass for F
where
    F: FnMut(&mut ContainerBuilder) -> ContainerResult<()> + Send + Sync,
{
    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        self(builder)
    }
}

/// Built-in passes, in execution order
pub fn default_passes() -> Vec<Box<dyn CompilerPass>> {
    vec![
        Box::new(ResolveChildDefinitionsPass),
        Box::new(AutowirePass),
        Box::new(CheckDefinitionsPass),
        Box::new(CheckCircularReferencesPass),
    ]
}
