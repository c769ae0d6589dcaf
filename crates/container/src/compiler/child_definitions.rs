use tracing::debug;

use super::CompilerPass;
use crate::{builder::ContainerBuilder, errors::ContainerResult};

/// Replaces every child definition by its merged form
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveChildDefinitionsPass;

impl CompilerPass for ResolveChildDefinitionsPass {
    fn name(&self) -> &str {
        "ResolveChildDefinitionsPass"
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        let children: Vec<String> = builder
            .definition_ids()
            .into_iter()
            .filter(|id| {
                builder
                    .get_definition(id)
                    .map_or(false, |definition| definition.parent().is_some())
            })
            .collect();

        // Merge everything first so later children still see unresolved parents
        let mut merged = Vec::with_capacity(children.len());
        for id in children {
            let definition = builder.resolved_definition(&id)?;
            merged.push((id, definition));
        }

        for (id, definition) in merged {
            debug!(service = %id, "child definition resolved");
            *builder.get_definition_mut(&id)? = definition;
        }
        Ok(())
    }
}
