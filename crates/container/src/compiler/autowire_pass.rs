use tracing::debug;

use super::CompilerPass;
use crate::{builder::ContainerBuilder, errors::ContainerResult};

/// Appends autowired constructor arguments to autowired definitions
#[derive(Debug, Default, Clone, Copy)]
pub struct AutowirePass;

impl CompilerPass for AutowirePass {
    fn name(&self) -> &str {
        "AutowirePass"
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        for id in builder.definition_ids() {
            let Some(arguments) = builder.autowire_definition(&id)? else {
                continue;
            };
            if arguments.is_empty() {
                continue;
            }

            debug!(service = %id, count = arguments.len(), "autowired arguments added");
            let mut definition = builder.get_definition_mut(&id)?;
            for argument in arguments {
                definition.add_argument(argument);
            }
        }
        Ok(())
    }
}
