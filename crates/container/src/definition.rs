//! Service blueprints.
//!
//! A [`Definition`] describes how to build one service. It is plain data: the
//! builder owns it, compiler passes rewrite it, and nothing here touches
//! instances.

use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    argument::{Argument, Arguments, Instance},
    errors::{ContainerError, ContainerResult},
    reference::Reference,
};

/// Attributes attached to one occurrence of a tag
pub type TagAttributes = BTreeMap<String, Value>;

pub fn tag_attributes<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> TagAttributes
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

pub type FactoryFn = Arc<dyn Fn(&Arguments) -> ContainerResult<Instance> + Send + Sync>;

/// Creates the instance instead of the type's constructor
#[derive(Clone)]
pub enum Factory {
    Closure(FactoryFn),
    /// Static factory registered on a service type
    Static { class: String, method: String },
    /// Factory method of another service
    Service { service: Reference, method: String },
}

impl Factory {
    pub fn closure<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        Factory::Closure(Arc::new(move |args: &Arguments| {
            factory(args).map(|instance| Box::new(instance) as Instance)
        }))
    }

    pub fn static_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Factory::Static {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn service_method(service: impl Into<Reference>, method: impl Into<String>) -> Self {
        Factory::Service {
            service: service.into(),
            method: method.into(),
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Closure(_) => f.write_str("Closure(..)"),
            Factory::Static { class, method } => write!(f, "Static({}::{})", class, method),
            Factory::Service { service, method } => write!(f, "Service({}::{})", service, method),
        }
    }
}

/// Setter injection step executed after construction
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Vec<Argument>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Definition {
    class: Option<String>,
    arguments: Vec<Argument>,
    argument_overrides: BTreeMap<usize, Argument>,
    method_calls: Vec<MethodCall>,
    tags: BTreeMap<String, Vec<TagAttributes>>,
    factory: Option<Factory>,
    parent: Option<String>,
    deprecated: Option<String>,
    // Unset flags fall back to the parent, then to the defaults
    public: Option<bool>,
    shared: Option<bool>,
    autowired: Option<bool>,
    lazy: Option<bool>,
    synthetic: bool,
    abstract_: bool,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Definition inheriting from `parent`
    pub fn child(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn set_class(&mut self, class: impl Into<String>) -> &mut Self {
        self.class = Some(class.into());
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn argument_overrides(&self) -> &BTreeMap<usize, Argument> {
        &self.argument_overrides
    }

    pub fn add_argument(&mut self, argument: impl Into<Argument>) -> &mut Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn set_arguments(&mut self, arguments: Vec<Argument>) -> &mut Self {
        self.arguments = arguments;
        self
    }

    /// Replace argument `index`.
    ///
    /// On a child definition the replacement is recorded as an override applied
    /// on top of the parent's arguments.
    pub fn replace_argument(
        &mut self,
        index: usize,
        argument: impl Into<Argument>,
    ) -> ContainerResult<&mut Self> {
        let argument = argument.into();
        if self.parent.is_some() {
            self.argument_overrides.insert(index, argument);
            return Ok(self);
        }

        match self.arguments.get_mut(index) {
            Some(slot) => {
                *slot = argument;
                Ok(self)
            }
            None => Err(ContainerError::configuration(
                format!(
                    "argument index {} is out of range, the definition has {} argument(s)",
                    index,
                    self.arguments.len()
                ),
                self.class.clone(),
            )),
        }
    }

    pub fn method_calls(&self) -> &[MethodCall] {
        &self.method_calls
    }

    pub fn add_method_call(&mut self, method: impl Into<String>, arguments: Vec<Argument>) -> &mut Self {
        self.method_calls.push(MethodCall::new(method, arguments));
        self
    }

    pub fn set_method_calls(&mut self, calls: Vec<MethodCall>) -> &mut Self {
        self.method_calls = calls;
        self
    }

    pub fn has_method_call(&self, method: &str) -> bool {
        self.method_calls.iter().any(|call| call.method == method)
    }

    pub fn remove_method_call(&mut self, method: &str) -> &mut Self {
        self.method_calls.retain(|call| call.method != method);
        self
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<TagAttributes>> {
        &self.tags
    }

    pub fn add_tag(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_tag_with(name, TagAttributes::new())
    }

    /// The same tag may be added several times with different attributes
    pub fn add_tag_with(&mut self, name: impl Into<String>, attributes: TagAttributes) -> &mut Self {
        self.tags.entry(name.into()).or_default().push(attributes);
        self
    }

    pub fn tag(&self, name: &str) -> &[TagAttributes] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn clear_tag(&mut self, name: &str) -> &mut Self {
        self.tags.remove(name);
        self
    }

    pub fn factory(&self) -> Option<&Factory> {
        self.factory.as_ref()
    }

    pub fn set_factory(&mut self, factory: Factory) -> &mut Self {
        self.factory = Some(factory);
        self
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_parent(&mut self, parent: impl Into<String>) -> &mut Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn set_deprecated(&mut self, message: impl Into<String>) -> &mut Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn is_public(&self) -> bool {
        self.public.unwrap_or(true)
    }

    pub fn set_public(&mut self, public: bool) -> &mut Self {
        self.public = Some(public);
        self
    }

    pub fn is_shared(&self) -> bool {
        self.shared.unwrap_or(true)
    }

    pub fn set_shared(&mut self, shared: bool) -> &mut Self {
        self.shared = Some(shared);
        self
    }

    pub fn is_autowired(&self) -> bool {
        self.autowired.unwrap_or(false)
    }

    pub fn set_autowired(&mut self, autowired: bool) -> &mut Self {
        self.autowired = Some(autowired);
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy.unwrap_or(false)
    }

    pub fn set_lazy(&mut self, lazy: bool) -> &mut Self {
        self.lazy = Some(lazy);
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn set_synthetic(&mut self, synthetic: bool) -> &mut Self {
        self.synthetic = synthetic;
        self
    }

    pub fn is_abstract(&self) -> bool {
        self.abstract_
    }

    pub fn set_abstract(&mut self, abstract_: bool) -> &mut Self {
        self.abstract_ = abstract_;
        self
    }

    /// Every reference used by arguments, overrides, method calls and the factory
    pub fn references(&self) -> Vec<&Reference> {
        let mut found: Vec<&Reference> = self
            .arguments
            .iter()
            .chain(self.argument_overrides.values())
            .chain(self.method_calls.iter().flat_map(|call| call.arguments.iter()))
            .flat_map(Argument::references)
            .collect();

        if let Some(Factory::Service { service, .. }) = &self.factory {
            found.push(service);
        }
        found
    }

    /// Tag names used as `Argument::Tagged`
    pub fn tagged_arguments(&self) -> Vec<&str> {
        fn collect<'a>(argument: &'a Argument, found: &mut Vec<&'a str>) {
            match argument {
                Argument::Tagged(tag) => found.push(tag),
                Argument::List(items) => items.iter().for_each(|item| collect(item, found)),
                Argument::Map(map) => map.values().for_each(|item| collect(item, found)),
                Argument::Value(_) | Argument::Reference(_) => {}
            }
        }

        let mut found = Vec::new();
        self.arguments
            .iter()
            .chain(self.argument_overrides.values())
            .chain(self.method_calls.iter().flat_map(|call| call.arguments.iter()))
            .for_each(|argument| collect(argument, &mut found));
        found
    }

    /// Merge this child definition onto an already resolved `parent`.
    ///
    /// Tags and the abstract and synthetic flags always come from the child.
    pub fn inherit_from(&self, parent: &Definition) -> ContainerResult<Definition> {
        let mut arguments = parent.arguments.clone();
        arguments.extend(self.arguments.iter().cloned());

        for (&index, argument) in &self.argument_overrides {
            match arguments.get_mut(index) {
                Some(slot) => *slot = argument.clone(),
                None => {
                    return Err(ContainerError::configuration(
                        format!(
                            "cannot replace argument {}: the inherited definition has {} argument(s)",
                            index,
                            arguments.len()
                        ),
                        self.parent.clone(),
                    ))
                }
            }
        }

        let mut method_calls = parent.method_calls.clone();
        method_calls.extend(self.method_calls.iter().cloned());

        Ok(Definition {
            class: self.class.clone().or_else(|| parent.class.clone()),
            arguments,
            argument_overrides: BTreeMap::new(),
            method_calls,
            tags: self.tags.clone(),
            factory: self.factory.clone().or_else(|| parent.factory.clone()),
            parent: None,
            deprecated: self.deprecated.clone().or_else(|| parent.deprecated.clone()),
            public: self.public.or(parent.public),
            shared: self.shared.or(parent.shared),
            autowired: self.autowired.or(parent.autowired),
            lazy: self.lazy.or(parent.lazy),
            synthetic: self.synthetic,
            abstract_: self.abstract_,
        })
    }
}
