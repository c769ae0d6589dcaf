//! Autowiring without reflection.
//!
//! Types opt in by implementing [`Autowire`] (usually through the
//! [`autowire!`](crate::autowire!) macro), which declares the constructor
//! parameters and how to build the value from resolved arguments. Matching a
//! parameter to a service happens at compile time of the container and only
//! produces `Reference`/literal arguments.

use tracing::{debug, warn};

use crate::{
    argument::{Argument, Arguments},
    builder::Registry,
    errors::{ContainerError, ContainerResult},
    service_type::{Parameter, ParameterKind},
};

pub trait Autowire: Send + Sync + Sized + 'static {
    /// Constructor parameters, in argument order
    fn parameters() -> Vec<Parameter>;

    fn construct(args: &Arguments) -> ContainerResult<Self>;
}

/// Implements [`Autowire`] for a struct whose fields are all `Arc<Dependency>`.
///
/// ```rust
/// use std::sync::Arc;
/// use container::autowire;
///
/// struct Logger;
/// struct Mailer {
///     logger: Arc<Logger>,
/// }
///
/// autowire!(Mailer { logger: Logger });
/// ```
#[macro_export]
macro_rules! autowire {
    ($ty:ident { $($field:ident : $dep:ty),* $(,)? }) => {
        impl $crate::Autowire for $ty {
            fn parameters() -> Vec<$crate::Parameter> {
                vec![$($crate::Parameter::service::<$dep>(stringify!($field))),*]
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn construct(args: &$crate::Arguments) -> $crate::ContainerResult<Self> {
                let mut index = 0usize;
                $(
                    let $field = args.service::<$dep>(index)?;
                    index += 1;
                )*
                Ok(Self { $($field),* })
            }
        }
    };
}

/// Fill the arguments of `consumer` from parameter `from_index` onwards.
///
/// Lookup order per service parameter: a service whose id is the type name,
/// an alias named after the type, the single registered service of that type,
/// the default value, null when nullable.
pub(crate) fn autowire_arguments(
    registry: &Registry,
    type_name: &str,
    from_index: usize,
    consumer: Option<&str>,
) -> ContainerResult<Vec<Argument>> {
    let ty = registry.service_type(type_name).ok_or_else(|| {
        ContainerError::autowiring(
            consumer.unwrap_or(type_name),
            "*",
            type_name,
            "has no registered type descriptor",
        )
    })?;
    let consumer_label = consumer.unwrap_or(type_name);

    ty.parameters()
        .iter()
        .skip(from_index)
        .map(|parameter| autowire_parameter(registry, parameter, consumer_label, consumer))
        .collect()
}

fn autowire_parameter(
    registry: &Registry,
    parameter: &Parameter,
    consumer_label: &str,
    consumer: Option<&str>,
) -> ContainerResult<Argument> {
    let dependency = match &parameter.kind {
        ParameterKind::Builtin(type_name) => {
            return parameter.default.clone().map(Argument::Value).ok_or_else(|| {
                ContainerError::autowiring(
                    consumer_label,
                    &parameter.name,
                    type_name,
                    "is a built-in type and has no default value, configure it explicitly",
                )
            });
        }
        ParameterKind::Service(type_name) => type_name.as_str(),
    };

    if consumer != Some(dependency) {
        if registry
            .definition(dependency)
            .map_or(false, |definition| !definition.is_abstract())
        {
            debug!(consumer = consumer_label, dependency, "autowired by id");
            return Ok(Argument::reference(dependency));
        }
        if registry.has_alias(dependency) {
            debug!(consumer = consumer_label, dependency, "autowired by alias");
            return Ok(Argument::reference(dependency));
        }
    }

    let candidates = registry.ids_of_type(dependency, consumer);
    match candidates.as_slice() {
        [single] => {
            debug!(consumer = consumer_label, dependency, service = %single, "autowired by type");
            return Ok(Argument::reference(single.clone()));
        }
        [] => {}
        many => {
            warn!(consumer = consumer_label, dependency, candidates = ?many, "ambiguous autowiring");
            return Err(ContainerError::autowiring(
                consumer_label,
                &parameter.name,
                dependency,
                format!(
                    "is ambiguous: services \"{}\" all match, use an alias or an explicit argument",
                    many.join("\", \"")
                ),
            ));
        }
    }

    if let Some(default) = &parameter.default {
        return Ok(Argument::Value(default.clone()));
    }
    if parameter.nullable {
        return Ok(Argument::null());
    }

    Err(ContainerError::autowiring(
        consumer_label,
        &parameter.name,
        dependency,
        "cannot be autowired: no service of that type is registered",
    ))
}
