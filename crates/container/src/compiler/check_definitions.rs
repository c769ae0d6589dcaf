use tracing::debug;

use super::CompilerPass;
use crate::{
    builder::ContainerBuilder,
    definition::{Definition, Factory},
    errors::{ContainerError, ContainerResult},
};

/// Rejects definitions that could never be constructed.
///
/// A concrete definition needs a factory or a registered type with a
/// constructor, every method call must exist on that type, and required
/// references must point at a registered service.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckDefinitionsPass;

impl CheckDefinitionsPass {
    fn check(builder: &ContainerBuilder, id: &str, definition: &Definition) -> ContainerResult<()> {
        let ty = definition.class().and_then(|class| builder.service_type(class));

        match definition.factory() {
            None => {
                let class = definition.class().ok_or_else(|| {
                    ContainerError::configuration("the definition has no class and no factory", Some(id))
                })?;
                let ty = ty.as_ref().ok_or_else(|| {
                    ContainerError::configuration(
                        format!("class \"{}\" is not a registered type", class),
                        Some(id),
                    )
                })?;
                if ty.constructor().is_none() {
                    return Err(ContainerError::configuration(
                        format!("type \"{}\" has no constructor", class),
                        Some(id),
                    ));
                }
            }
            Some(Factory::Static { class, method }) => {
                let known = builder
                    .service_type(class)
                    .map_or(false, |ty| ty.static_factory(method).is_some());
                if !known {
                    return Err(ContainerError::configuration(
                        format!("no static factory \"{}::{}\"", class, method),
                        Some(id),
                    ));
                }
            }
            Some(Factory::Closure(_)) | Some(Factory::Service { .. }) => {}
        }

        for call in definition.method_calls() {
            let known = ty.as_ref().map_or(false, |ty| ty.has_method(&call.method));
            if !known {
                return Err(ContainerError::configuration(
                    format!(
                        "method \"{}\" is not registered for class \"{}\"",
                        call.method,
                        definition.class().unwrap_or("?")
                    ),
                    Some(id),
                ));
            }
        }

        for reference in definition.references() {
            if !reference.is_required() {
                continue;
            }
            let known = builder.resolves_to_definition(reference.id())
                || builder.container().is_cached(reference.id());
            if !known {
                return Err(ContainerError::service_not_found(reference.id()).referenced_by(id));
            }
        }
        Ok(())
    }
}

impl CompilerPass for CheckDefinitionsPass {
    fn name(&self) -> &str {
        "CheckDefinitionsPass"
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        let mut checked = 0usize;
        for id in builder.definition_ids() {
            let definition = builder.resolved_definition(&id)?;
            if definition.is_abstract() || definition.is_synthetic() {
                continue;
            }
            Self::check(builder, &id, &definition)?;
            checked += 1;
        }
        debug!(checked, "definitions checked");
        Ok(())
    }
}
