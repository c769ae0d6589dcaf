//! Service container with a build-then-freeze lifecycle.
//!
//! Register [`Definition`]s on a [`ContainerBuilder`], add compiler passes,
//! call [`ContainerBuilder::compile`], then resolve services with
//! [`ServiceLocator::get`].
//!
//! ```rust
//! use std::sync::Arc;
//! use container::{autowire, ContainerBuilder, ServiceLocator};
//!
//! struct Logger;
//! struct Mailer {
//!     logger: Arc<Logger>,
//! }
//! autowire!(Logger {});
//! autowire!(Mailer { logger: Logger });
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_autowired::<Logger>()?;
//! builder.register_autowired::<Mailer>()?;
//! builder.compile()?;
//!
//! let mailer = builder.get_typed::<Mailer>(std::any::type_name::<Mailer>())?;
//! let logger = builder.get_typed::<Logger>(std::any::type_name::<Logger>())?;
//! assert!(Arc::ptr_eq(&mailer.logger, &logger));
//! # Ok::<(), container::ContainerError>(())
//! ```

pub mod argument;
pub mod autowire;
pub mod builder;
pub mod compiler;
pub mod container;
pub mod definition;
pub mod errors;
pub mod graph;
pub mod lazy;
pub mod loader;
pub mod logging;
pub mod parameters;
pub mod reference;
pub mod service_type;

pub use argument::{Argument, Arguments, Instance, Resolved, Service};
pub use autowire::Autowire;
pub use builder::{Alias, ContainerBuilder, DefinitionMut, DefinitionRef};
pub use compiler::{
    AutowirePass, CheckCircularReferencesPass, CheckDefinitionsPass, CompilerPass,
    ResolveChildDefinitionsPass, TaggedService, TaggedServicesPass,
};
pub use container::{Container, ContainerStats, ServiceLocator};
pub use definition::{tag_attributes, Definition, Factory, MethodCall, TagAttributes};
pub use errors::{ContainerContextExt, ContainerError, ContainerResult};
pub use graph::{ServiceGraph, ServiceGraphStats};
pub use lazy::LazyService;
pub use loader::{ConfigFormat, ConfigLoader, ServicesConfig};
pub use logging::{init_logging, LoggingConfig};
pub use parameters::ParameterBag;
pub use reference::{InvalidBehavior, Reference};
pub use service_type::{Parameter, ParameterKind, ServiceType};
