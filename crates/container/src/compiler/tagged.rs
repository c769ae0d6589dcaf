use serde_json::Value;
use tracing::debug;

use super::CompilerPass;
use crate::{
    argument::Argument,
    builder::ContainerBuilder,
    definition::TagAttributes,
    errors::{ContainerError, ContainerResult},
    reference::Reference,
};

/// One occurrence of a tag on a service
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedService {
    pub id: String,
    pub attributes: TagAttributes,
    pub priority: i64,
}

fn priority_of(id: &str, attributes: &TagAttributes) -> ContainerResult<i64> {
    match attributes.get("priority") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) if n.is_i64() => n
            .as_i64()
            .ok_or_else(|| invalid_priority(id, n)),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid_priority(id, s)),
        Some(other) => Err(invalid_priority(id, other)),
    }
}

fn invalid_priority(id: &str, value: impl std::fmt::Display) -> ContainerError {
    ContainerError::configuration(
        format!("tag priority must be an integer, got {}", value),
        Some(id),
    )
}

/// Flatten tag occurrences and order them by `priority`, highest first.
///
/// Ties keep registration order, and a service tagged twice yields two entries.
pub fn sort_by_priority(
    tagged: Vec<(String, Vec<TagAttributes>)>,
) -> ContainerResult<Vec<TaggedService>> {
    let mut services = Vec::new();
    for (id, occurrences) in tagged {
        for attributes in occurrences {
            let priority = priority_of(&id, &attributes)?;
            services.push(TaggedService {
                id: id.clone(),
                attributes,
                priority,
            });
        }
    }

    services.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(services)
}

/// Ids tagged with `tag`, highest priority first, each id once
pub fn priority_ordered_ids(
    tagged: Vec<(String, Vec<TagAttributes>)>,
) -> ContainerResult<Vec<String>> {
    let mut ids: Vec<String> = Vec::new();
    for service in sort_by_priority(tagged)? {
        if !ids.contains(&service.id) {
            ids.push(service.id);
        }
    }
    Ok(ids)
}

/// Wires every service carrying a tag into an aggregating service.
///
/// For each tag occurrence, in priority order, a call
/// `method(@service, attribute...)` is appended to the aggregator. Nothing
/// happens when the aggregator is not registered.
#[derive(Debug, Clone)]
pub struct TaggedServicesPass {
    tag: String,
    aggregator: String,
    method: String,
    attributes: Vec<String>,
}

impl TaggedServicesPass {
    pub fn new(
        tag: impl Into<String>,
        aggregator: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            aggregator: aggregator.into(),
            method: method.into(),
            attributes: Vec::new(),
        }
    }

    /// Tag attributes passed after the reference, null when absent
    pub fn passing_attributes(mut self, attributes: &[&str]) -> Self {
        self.attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }
}

impl CompilerPass for TaggedServicesPass {
    fn name(&self) -> &str {
        "TaggedServicesPass"
    }

    fn process(&mut self, builder: &mut ContainerBuilder) -> ContainerResult<()> {
        if !builder.has_definition(&self.aggregator) {
            debug!(aggregator = %self.aggregator, tag = %self.tag, "aggregator missing, skipping");
            return Ok(());
        }

        let tagged = builder.find_tagged_services_by_priority(&self.tag)?;
        let mut aggregator = builder.get_definition_mut(&self.aggregator)?;
        for service in &tagged {
            let mut arguments = vec![Argument::Reference(Reference::new(service.id.clone()))];
            arguments.extend(self.attributes.iter().map(|name| {
                Argument::Value(service.attributes.get(name).cloned().unwrap_or(Value::Null))
            }));
            aggregator.add_method_call(self.method.clone(), arguments);
        }

        debug!(
            tag = %self.tag,
            aggregator = %self.aggregator,
            services = tagged.len(),
            "tagged services wired"
        );
        Ok(())
    }
}
