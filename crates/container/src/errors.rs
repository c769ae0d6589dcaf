//! Error handling for the service container.
//!
//! Every failure of the container surfaces as a [`ContainerError`]. Nothing is
//! recovered internally: a failing `get()` or `compile()` returns the error to
//! the caller unchanged.
//!
//! # Error kinds
//!
//! - **NotFound**: [`ContainerError::ServiceNotFound`], [`ContainerError::ParameterNotFound`]
//! - **Cycles**: [`ContainerError::CircularDependency`],
//!   [`ContainerError::ParameterCircularReference`], [`ContainerError::AliasCircularReference`]
//! - **Frozen**: [`ContainerError::Frozen`], mutation after `compile()`
//! - **Misuse**: [`ContainerError::SyntheticService`], [`ContainerError::AbstractService`]
//! - **Autowiring**: [`ContainerError::Autowiring`]
//!
//! Callers that work with `anyhow` can attach context through
//! [`ContainerContextExt`]:
//!
//! ```rust
//! use container::{Container, ContainerContextExt, ServiceLocator};
//!
//! let container = Container::new();
//! let result = container.get("mailer").container_context("While booting the mailer");
//! assert!(result.is_err());
//! ```

use anyhow::Context;
use thiserror::Error;

/// Result alias used across the container API
pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContainerError {
    /// Requested service id has no registration (or is private)
    #[error(
        "You have requested a {} service \"{id}\"{}",
        visibility_label(.private),
        referenced_by_suffix(.referenced_by)
    )]
    ServiceNotFound {
        id: String,
        referenced_by: Option<String>,
        private: bool,
    },

    #[error("You have requested a non-existent parameter \"{name}\"{}", referenced_by_suffix(.referenced_by))]
    ParameterNotFound {
        name: String,
        referenced_by: Option<String>,
    },

    /// A service transitively depends on itself
    #[error("Circular reference detected for service \"{}\", path: \"{}\"", cycle_head(.path), .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("Circular reference detected for parameter \"{}\", path: \"{}\"", cycle_head(.path), .path.join(" -> "))]
    ParameterCircularReference { path: Vec<String> },

    #[error("Circular reference detected for alias \"{}\", path: \"{}\"", cycle_head(.path), .path.join(" -> "))]
    AliasCircularReference { path: Vec<String> },

    #[error("Cannot {operation} on a compiled container")]
    Frozen { operation: String },

    #[error("Service \"{id}\" is synthetic: it must be set at runtime via set() before it can be used")]
    SyntheticService { id: String },

    #[error("Service \"{id}\" is abstract: it is a template only and cannot be instantiated")]
    AbstractService { id: String },

    #[error("Cannot autowire \"{consumer}\": argument \"{parameter}\" of type \"{dependency}\" {reason}")]
    Autowiring {
        consumer: String,
        parameter: String,
        dependency: String,
        reason: String,
    },

    #[error("Invalid configuration{}: {message}", service_suffix(.service))]
    Configuration {
        message: String,
        service: Option<String>,
    },

    #[error("Invalid argument {index} for \"{consumer}\": expected {expected}")]
    InvalidArgument {
        consumer: String,
        index: usize,
        expected: String,
    },

    /// A constructor, factory or method reported a failure
    #[error("Failed to construct service \"{id}\": {message}")]
    Construction { id: String, message: String },

    #[error("Service \"{id}\" is not of type \"{expected}\"")]
    TypeMismatch { id: String, expected: String },
}

fn visibility_label(private: &bool) -> &'static str {
    if *private {
        "private"
    } else {
        "non-existent"
    }
}

fn cycle_head(path: &[String]) -> &str {
    path.first().map(String::as_str).unwrap_or_default()
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    referenced_by
        .as_ref()
        .map(|source| format!(" referenced by \"{}\"", source))
        .unwrap_or_default()
}

fn service_suffix(service: &Option<String>) -> String {
    service
        .as_ref()
        .map(|id| format!(" for service \"{}\"", id))
        .unwrap_or_default()
}

impl ContainerError {
    pub fn service_not_found(id: impl Into<String>) -> Self {
        ContainerError::ServiceNotFound {
            id: id.into(),
            referenced_by: None,
            private: false,
        }
    }

    pub fn private_service(id: impl Into<String>) -> Self {
        ContainerError::ServiceNotFound {
            id: id.into(),
            referenced_by: None,
            private: true,
        }
    }

    pub fn parameter_not_found(name: impl Into<String>, referenced_by: Option<String>) -> Self {
        ContainerError::ParameterNotFound {
            name: name.into(),
            referenced_by,
        }
    }

    pub fn frozen(operation: impl Into<String>) -> Self {
        ContainerError::Frozen {
            operation: operation.into(),
        }
    }

    pub fn configuration(message: impl Into<String>, service: Option<impl Into<String>>) -> Self {
        ContainerError::Configuration {
            message: message.into(),
            service: service.map(|s| s.into()),
        }
    }

    pub fn autowiring(
        consumer: impl Into<String>,
        parameter: impl Into<String>,
        dependency: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ContainerError::Autowiring {
            consumer: consumer.into(),
            parameter: parameter.into(),
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }

    pub fn construction(id: impl Into<String>, message: impl Into<String>) -> Self {
        ContainerError::Construction {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Attach the id of the service whose definition referenced the missing one
    pub fn referenced_by(self, source: impl Into<String>) -> Self {
        match self {
            ContainerError::ServiceNotFound {
                id,
                referenced_by: None,
                private,
            } => ContainerError::ServiceNotFound {
                id,
                referenced_by: Some(source.into()),
                private,
            },
            other => other,
        }
    }

    /// Only errors that can disappear without a configuration change are recoverable:
    /// a missing service may still be `set()` and a constructor may fail transiently.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ContainerError::ServiceNotFound { .. } => true,
            ContainerError::SyntheticService { .. } => true,
            ContainerError::Construction { .. } => true,
            ContainerError::ParameterNotFound { .. } => false,
            ContainerError::CircularDependency { .. } => false,
            ContainerError::ParameterCircularReference { .. } => false,
            ContainerError::AliasCircularReference { .. } => false,
            ContainerError::Frozen { .. } => false,
            ContainerError::AbstractService { .. } => false,
            ContainerError::Autowiring { .. } => false,
            ContainerError::Configuration { .. } => false,
            ContainerError::InvalidArgument { .. } => false,
            ContainerError::TypeMismatch { .. } => false,
        }
    }

    /// Error category for monitoring
    pub fn category(&self) -> &'static str {
        match self {
            ContainerError::ServiceNotFound { .. } | ContainerError::ParameterNotFound { .. } => {
                "not_found"
            }
            ContainerError::CircularDependency { .. }
            | ContainerError::ParameterCircularReference { .. }
            | ContainerError::AliasCircularReference { .. } => "circular",
            ContainerError::Frozen { .. } => "frozen",
            ContainerError::SyntheticService { .. } | ContainerError::AbstractService { .. } => {
                "misuse"
            }
            ContainerError::Autowiring { .. } => "autowiring",
            ContainerError::Configuration { .. } => "configuration",
            ContainerError::InvalidArgument { .. } | ContainerError::TypeMismatch { .. } => {
                "argument"
            }
            ContainerError::Construction { .. } => "construction",
        }
    }
}

/// Adds container context to `anyhow` errors
pub trait ContainerContextExt<T> {
    fn container_context(self, message: &str) -> anyhow::Result<T>;
    fn container_with_context<F>(self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ContainerContextExt<T> for ContainerResult<T> {
    fn container_context(self, message: &str) -> anyhow::Result<T> {
        self.map_err(anyhow::Error::from)
            .with_context(|| message.to_string())
    }

    fn container_with_context<F>(self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(anyhow::Error::from).with_context(f)
    }
}

/// Shorthand for the common [`ContainerError`] constructors
#[macro_export]
macro_rules! container_error {
    (not_found: $id:expr) => {
        $crate::errors::ContainerError::service_not_found($id)
    };

    (frozen: $op:expr) => {
        $crate::errors::ContainerError::frozen($op)
    };

    (configuration: $msg:expr) => {
        $crate::errors::ContainerError::configuration($msg, None::<String>)
    };

    (configuration: $msg:expr, $service:expr) => {
        $crate::errors::ContainerError::configuration($msg, Some($service))
    };

    (construction: $id:expr, $msg:expr) => {
        $crate::errors::ContainerError::construction($id, $msg)
    };
}
