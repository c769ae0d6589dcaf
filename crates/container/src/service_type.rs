//! Type descriptors.
//!
//! There is no runtime reflection, so every constructible type is described
//! explicitly: its constructor parameters, a constructor closure, a dispatch
//! table of setter methods, optional named factories and the interfaces it
//! satisfies. Autowiring and setter injection only work through this table.

use serde_json::Value;
use std::{
    any::{type_name, Any},
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use crate::{
    argument::{Arguments, Instance, Service},
    autowire::Autowire,
    errors::{ContainerError, ContainerResult},
};

pub type ConstructorFn = Arc<dyn Fn(&Arguments) -> ContainerResult<Instance> + Send + Sync>;
pub type MethodFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Arguments) -> ContainerResult<()> + Send + Sync>;
pub type ServiceFactoryFn =
    Arc<dyn Fn(&Service, &Arguments) -> ContainerResult<Instance> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    /// Scalar or collection that can never be autowired
    Builtin(String),
    /// Service type, matched by name against ids, aliases and registered types
    Service(String),
}

/// One constructor parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<Value>,
    pub nullable: bool,
}

impl Parameter {
    fn with_kind(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            nullable: false,
        }
    }

    pub fn service<T: ?Sized>(name: impl Into<String>) -> Self {
        Self::service_named(name, type_name::<T>())
    }

    /// Service parameter identified by an explicit type name (interfaces)
    pub fn service_named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_kind(name, ParameterKind::Service(type_name.into()))
    }

    pub fn builtin(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_kind(name, ParameterKind::Builtin(type_name.into()))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::builtin(name, "string")
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::builtin(name, "int")
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::builtin(name, "float")
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::builtin(name, "bool")
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::builtin(name, "array")
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn type_name(&self) -> &str {
        match &self.kind {
            ParameterKind::Builtin(name) | ParameterKind::Service(name) => name,
        }
    }
}

#[derive(Clone)]
pub struct ServiceType {
    name: String,
    parameters: Vec<Parameter>,
    constructor: Option<ConstructorFn>,
    methods: BTreeMap<String, MethodFn>,
    static_factories: BTreeMap<String, ConstructorFn>,
    service_factories: BTreeMap<String, ServiceFactoryFn>,
    interfaces: BTreeSet<String>,
}

impl ServiceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            constructor: None,
            methods: BTreeMap::new(),
            static_factories: BTreeMap::new(),
            service_factories: BTreeMap::new(),
            interfaces: BTreeSet::new(),
        }
    }

    /// Descriptor named after the Rust type
    pub fn of<T: ?Sized>() -> Self {
        Self::new(type_name::<T>())
    }

    /// Descriptor with parameters and constructor taken from [`Autowire`]
    pub fn autowired<T: Autowire>() -> Self {
        Self::of::<T>()
            .with_parameters(T::parameters())
            .with_constructor(T::construct)
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_constructor<T, F>(mut self, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |args: &Arguments| {
            constructor(args).map(|instance| Box::new(instance) as Instance)
        }));
        self
    }

    /// Register a setter callable from method calls
    pub fn with_method<T, F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&mut T, &Arguments) -> ContainerResult<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        self.methods.insert(
            name,
            Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &Arguments| {
                match target.downcast_mut::<T>() {
                    Some(target) => method(target, args),
                    None => Err(ContainerError::TypeMismatch {
                        id: format!("{}::{}", args.consumer(), method_name),
                        expected: type_name::<T>().to_string(),
                    }),
                }
            }),
        );
        self
    }

    pub fn with_static_factory<T, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.static_factories.insert(
            name.into(),
            Arc::new(move |args: &Arguments| {
                factory(args).map(|instance| Box::new(instance) as Instance)
            }),
        );
        self
    }

    /// Factory method invoked on an existing service of this type
    pub fn with_service_factory<S, T, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        S: Any + Send + Sync,
        T: Send + Sync + 'static,
        F: Fn(&S, &Arguments) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        self.service_factories.insert(
            name,
            Arc::new(move |service: &Service, args: &Arguments| {
                match (**service).downcast_ref::<S>() {
                    Some(target) => {
                        factory(target, args).map(|instance| Box::new(instance) as Instance)
                    }
                    None => Err(ContainerError::TypeMismatch {
                        id: format!("{}::{}", args.consumer(), method_name),
                        expected: type_name::<S>().to_string(),
                    }),
                }
            }),
        );
        self
    }

    /// Declare that this type satisfies an interface name
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.insert(interface.into());
        self
    }

    pub fn implements_type<I: ?Sized>(self) -> Self {
        self.implements(type_name::<I>())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn constructor(&self) -> Option<&ConstructorFn> {
        self.constructor.as_ref()
    }

    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn static_factory(&self, name: &str) -> Option<&ConstructorFn> {
        self.static_factories.get(name)
    }

    pub fn service_factory(&self, name: &str) -> Option<&ServiceFactoryFn> {
        self.service_factories.get(name)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(String::as_str)
    }

    /// True for the type itself and every declared interface
    pub fn is_a(&self, type_name: &str) -> bool {
        self.name == type_name || self.interfaces.contains(type_name)
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("constructor", &self.constructor.is_some())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("interfaces", &self.interfaces)
            .finish()
    }
}
