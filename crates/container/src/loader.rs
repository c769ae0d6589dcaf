//! Declarative service configuration.
//!
//! Loads parameters, services and aliases from TOML, JSON or YAML and applies
//! them to a [`ContainerBuilder`] through the registration API. Types are not
//! part of the file: every `class` must be registered in code.
//!
//! ```yaml
//! imports: [common.yaml]
//! parameters:
//!   mailer.transport: smtp
//! services:
//!   mailer:
//!     class: Mailer
//!     arguments: ["%mailer.transport%", "@logger", "@?profiler"]
//!     calls:
//!       - { method: set_listeners, arguments: ["!tagged mailer.listener"] }
//!     tags: [{ name: monolog.logger, channel: mail }]
//!   app.mailer: "@mailer"
//! ```
//!
//! String arguments: `@id` references a service, `@?id` references it with
//! ignore-on-missing behavior, `@@text` is the literal `@text`, and
//! `!tagged name` injects every service tagged `name`.
//!
//! A service built by a `factory` still needs a `class` (or a `parent`) to
//! declare `calls`.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    argument::Argument,
    builder::{Alias, ContainerBuilder},
    definition::{Definition, Factory, MethodCall},
    reference::Reference,
};

const MAX_IMPORT_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Some(ConfigFormat::Toml),
            Some("json") => Some(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Some(ConfigFormat::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesConfig {
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    /// `"@target"` shorthand for an alias
    Alias(String),
    Definition(Box<ServiceConfig>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub class: Option<String>,
    /// Makes the entry an alias of another service
    pub alias: Option<String>,
    pub arguments: Vec<Value>,
    pub calls: Vec<CallConfig>,
    pub tags: Vec<TagConfig>,
    pub factory: Option<FactoryConfig>,
    pub parent: Option<String>,
    pub public: Option<bool>,
    pub shared: Option<bool>,
    pub autowire: Option<bool>,
    pub lazy: Option<bool>,
    pub synthetic: bool,
    #[serde(rename = "abstract")]
    pub abstract_: bool,
    pub deprecated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallConfig {
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagConfig {
    Name(String),
    WithAttributes {
        name: String,
        #[serde(flatten)]
        attributes: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FactoryConfig {
    Service { service: String, method: String },
    Static { class: String, method: String },
}

/// Turn a configuration value into a definition argument
pub fn parse_argument(value: Value) -> Argument {
    match value {
        Value::String(s) => {
            if let Some(literal) = s.strip_prefix("@@") {
                Argument::Value(Value::String(format!("@{}", literal)))
            } else if let Some(id) = s.strip_prefix("@?") {
                Argument::Reference(Reference::ignore_on_missing(id))
            } else if let Some(id) = s.strip_prefix('@') {
                Argument::Reference(Reference::new(id))
            } else if let Some(tag) = s.strip_prefix("!tagged ") {
                Argument::Tagged(tag.trim().to_string())
            } else {
                Argument::Value(Value::String(s))
            }
        }
        Value::Array(items) => Argument::List(items.into_iter().map(parse_argument).collect()),
        Value::Object(map) => Argument::Map(
            map.into_iter()
                .map(|(key, value)| (key, parse_argument(value)))
                .collect(),
        ),
        other => Argument::Value(other),
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    max_depth: usize,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_IMPORT_DEPTH,
        }
    }

    pub fn max_import_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn parse_str(content: &str, format: ConfigFormat) -> Result<ServicesConfig> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML service configuration")?,
            ConfigFormat::Json => {
                serde_json::from_str(content).context("Invalid JSON service configuration")?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).context("Invalid YAML service configuration")?
            }
        };
        Ok(config)
    }

    pub fn load_file<P: AsRef<Path>>(&self, builder: &mut ContainerBuilder, path: P) -> Result<()> {
        self.load_file_at_depth(builder, path.as_ref(), 0)
    }

    /// Imports in `content` are resolved against the current directory
    pub fn load_str(&self, builder: &mut ContainerBuilder, content: &str, format: ConfigFormat) -> Result<()> {
        let config = Self::parse_str(content, format)?;
        self.apply_at_depth(builder, config, Path::new("."), 0)
    }

    pub fn apply(&self, builder: &mut ContainerBuilder, config: ServicesConfig) -> Result<()> {
        self.apply_at_depth(builder, config, Path::new("."), 0)
    }

    fn load_file_at_depth(&self, builder: &mut ContainerBuilder, path: &Path, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            bail!(
                "Import depth limit of {} exceeded while loading {}",
                self.max_depth,
                path.display()
            );
        }

        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| anyhow!("Unsupported configuration file format: {:?}", path.extension()))?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read service configuration {}", path.display()))?;
        let config = Self::parse_str(&content, format)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        debug!(path = %path.display(), "service configuration loaded");
        let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        self.apply_at_depth(builder, config, &base, depth)
    }

    fn apply_at_depth(
        &self,
        builder: &mut ContainerBuilder,
        config: ServicesConfig,
        base: &Path,
        depth: usize,
    ) -> Result<()> {
        for import in &config.imports {
            self.load_file_at_depth(builder, &base.join(import), depth + 1)
                .with_context(|| format!("Failed to import {}", import))?;
        }

        for (name, value) in config.parameters {
            builder
                .set_parameter(name.clone(), value)
                .with_context(|| format!("Failed to set parameter \"{}\"", name))?;
        }

        let count = config.services.len();
        for (id, entry) in config.services {
            Self::apply_service(builder, &id, entry)
                .with_context(|| format!("Invalid configuration for service \"{}\"", id))?;
        }

        info!(services = count, depth, "service configuration applied");
        Ok(())
    }

    fn apply_service(builder: &mut ContainerBuilder, id: &str, entry: ServiceEntry) -> Result<()> {
        let config = match entry {
            ServiceEntry::Alias(target) => {
                let target = target
                    .strip_prefix('@')
                    .ok_or_else(|| anyhow!("a string entry must be an alias like \"@{}\"", target))?;
                builder.set_alias(id, target)?;
                return Ok(());
            }
            ServiceEntry::Definition(config) => *config,
        };

        if let Some(target) = config.alias {
            let alias = match config.public {
                Some(false) => Alias::private(target),
                _ => Alias::new(target),
            };
            builder.set_alias(id, alias)?;
            return Ok(());
        }

        if config.class.is_none() && config.parent.is_none() && !config.calls.is_empty() {
            bail!("method calls on \"{}\" need a `class`: setters are dispatched through the registered type", id);
        }

        let mut definition = match (&config.parent, &config.class) {
            (Some(parent), class) => {
                let mut definition = Definition::child(parent.as_str());
                if let Some(class) = class {
                    definition.set_class(class.as_str());
                }
                definition
            }
            (None, Some(class)) => Definition::of(class.as_str()),
            (None, None) if config.factory.is_some() => Definition::new(),
            (None, None) => Definition::of(id),
        };

        definition.set_arguments(config.arguments.into_iter().map(parse_argument).collect());
        definition.set_method_calls(
            config
                .calls
                .into_iter()
                .map(|call| {
                    MethodCall::new(call.method, call.arguments.into_iter().map(parse_argument).collect())
                })
                .collect(),
        );

        for tag in config.tags {
            match tag {
                TagConfig::Name(name) => definition.add_tag(name),
                TagConfig::WithAttributes { name, attributes } => definition.add_tag_with(name, attributes),
            };
        }

        if let Some(factory) = config.factory {
            definition.set_factory(match factory {
                FactoryConfig::Service { service, method } => Factory::service_method(service, method),
                FactoryConfig::Static { class, method } => Factory::static_method(class, method),
            });
        }

        if let Some(public) = config.public {
            definition.set_public(public);
        }
        if let Some(shared) = config.shared {
            definition.set_shared(shared);
        }
        if let Some(autowire) = config.autowire {
            definition.set_autowired(autowire);
        }
        if let Some(lazy) = config.lazy {
            definition.set_lazy(lazy);
        }
        if let Some(message) = config.deprecated {
            definition.set_deprecated(message);
        }
        definition
            .set_synthetic(config.synthetic)
            .set_abstract(config.abstract_);

        builder.set_definition(id, definition)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InvalidBehavior;

    #[test]
    fn test_parse_argument_notation() {
        assert_eq!(parse_argument(Value::from("@logger")), Argument::reference("logger"));
        assert_eq!(
            parse_argument(Value::from("@?profiler")),
            Argument::Reference(Reference::with_behavior("profiler", InvalidBehavior::Ignore))
        );
        assert_eq!(parse_argument(Value::from("@@handle")), Argument::value("@handle"));
        assert_eq!(
            parse_argument(Value::from("!tagged app.listener")),
            Argument::tagged("app.listener")
        );
        assert_eq!(parse_argument(Value::from("%dsn%")), Argument::parameter("dsn"));
        assert_eq!(parse_argument(Value::from(3)), Argument::value(3));
    }

    #[test]
    fn test_parse_yaml() -> Result<()> {
        let config = ConfigLoader::parse_str(
            r#"
parameters:
  locale: en
services:
  mailer:
    class: Mailer
    arguments: ["@transport", "%locale%"]
    tags:
      - mailer.hook
      - { name: listener, priority: 10 }
  app.mailer: "@mailer"
"#,
            ConfigFormat::Yaml,
        )?;

        assert_eq!(config.parameters["locale"], Value::from("en"));
        assert_eq!(config.services.len(), 2);
        match &config.services["mailer"] {
            ServiceEntry::Definition(service) => {
                assert_eq!(service.class.as_deref(), Some("Mailer"));
                assert_eq!(service.tags.len(), 2);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
        assert!(matches!(&config.services["app.mailer"], ServiceEntry::Alias(_)));
        Ok(())
    }

    #[test]
    fn test_unknown_service_field_is_rejected() {
        let result = ConfigLoader::parse_str(
            r#"{"services": {"mailer": {"klass": "Mailer"}}}"#,
            ConfigFormat::Json,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/services.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("services.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("services.ini")), None);
    }
}
