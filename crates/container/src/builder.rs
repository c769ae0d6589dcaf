//! Build-time container.
//!
//! [`ContainerBuilder`] owns the definition registry, aliases, type
//! descriptors and compiler passes. It constructs services from definitions
//! on demand, both before and after [`ContainerBuilder::compile`]; compiling
//! runs the passes once and freezes the registry.

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde_json::Value;
use std::{
    any::type_name,
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    argument::{Argument, Arguments, Instance, Resolved, Service},
    autowire::{autowire_arguments, Autowire},
    compiler::{
        default_passes,
        tagged::{priority_ordered_ids, sort_by_priority, TaggedService},
        CompilerPass,
    },
    container::{Container, ContainerStats, Created, ServiceLocator},
    definition::{Definition, Factory, TagAttributes},
    errors::{ContainerError, ContainerResult},
    graph::ServiceGraph,
    lazy::LazyService,
    reference::{InvalidBehavior, Reference},
    service_type::ServiceType,
};

pub type DefinitionRef<'a> = MappedRwLockReadGuard<'a, Definition>;
pub type DefinitionMut<'a> = MappedRwLockWriteGuard<'a, Definition>;

/// Alternative id for a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    id: String,
    public: bool,
}

impl Alias {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public: true,
        }
    }

    pub fn private(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_public(&self) -> bool {
        self.public
    }
}

impl From<&str> for Alias {
    fn from(id: &str) -> Self {
        Alias::new(id)
    }
}

impl From<String> for Alias {
    fn from(id: String) -> Self {
        Alias::new(id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    definitions: HashMap<String, Definition>,
    order: Vec<String>,
    aliases: BTreeMap<String, Alias>,
    types: HashMap<String, Arc<ServiceType>>,
    compiled: bool,
}

impl Registry {
    fn ensure_not_compiled(&self, operation: &str) -> ContainerResult<()> {
        if self.compiled {
            return Err(ContainerError::frozen(operation));
        }
        Ok(())
    }

    pub(crate) fn definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    /// Definition ids in registration order
    pub(crate) fn ids(&self) -> &[String] {
        &self.order
    }

    fn insert_definition(&mut self, id: String, definition: Definition) {
        if self.definitions.contains_key(&id) {
            warn!(service = %id, "overwriting existing definition");
        } else {
            self.order.push(id.clone());
        }
        self.aliases.remove(&id);
        self.definitions.insert(id, definition);
    }

    fn remove_definition(&mut self, id: &str) -> Option<Definition> {
        self.order.retain(|entry| entry != id);
        self.definitions.remove(id)
    }

    pub(crate) fn has_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Follow the alias chain from `id`.
    ///
    /// Returns the final id and, when `id` is an alias, that alias's visibility.
    pub(crate) fn resolve_alias(&self, id: &str) -> ContainerResult<(String, Option<bool>)> {
        let mut visibility = None;
        let mut path = vec![id.to_string()];
        let mut current = id;

        while let Some(alias) = self.aliases.get(current) {
            visibility.get_or_insert(alias.public);
            current = &alias.id;
            if path.iter().any(|seen| seen == current) {
                let start = path.iter().position(|seen| seen == current).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(current.to_string());
                return Err(ContainerError::AliasCircularReference { path: cycle });
            }
            path.push(current.to_string());
        }

        Ok((current.to_string(), visibility))
    }

    /// Definition of `id` with its parent chain merged in
    pub(crate) fn resolved_definition(&self, id: &str) -> ContainerResult<Cow<'_, Definition>> {
        let definition = self
            .definitions
            .get(id)
            .ok_or_else(|| ContainerError::service_not_found(id))?;
        if definition.parent().is_none() {
            return Ok(Cow::Borrowed(definition));
        }

        let mut chain = vec![(id, definition)];
        let mut current = definition;
        while let Some(parent_id) = current.parent() {
            if chain.iter().any(|(seen, _)| *seen == parent_id) {
                let mut path: Vec<String> = chain.iter().map(|(seen, _)| seen.to_string()).collect();
                path.push(parent_id.to_string());
                return Err(ContainerError::configuration(
                    format!("circular parent chain \"{}\"", path.join(" -> ")),
                    Some(id),
                ));
            }
            let (parent_key, _) = self.resolve_alias(parent_id)?;
            current = self
                .definitions
                .get(&parent_key)
                .ok_or_else(|| ContainerError::service_not_found(parent_key.as_str()).referenced_by(id))?;
            chain.push((parent_id, current));
        }

        let mut chain = chain.into_iter().rev();
        let mut merged = match chain.next() {
            Some((_, root)) => root.clone(),
            None => return Err(ContainerError::service_not_found(id)),
        };
        for (_, child) in chain {
            merged = child.inherit_from(&merged)?;
        }
        Ok(Cow::Owned(merged))
    }

    pub(crate) fn service_type(&self, name: &str) -> Option<Arc<ServiceType>> {
        self.types.get(name).cloned()
    }

    /// Non-abstract services whose class is, or implements, `type_name`
    pub(crate) fn ids_of_type(&self, type_name: &str, exclude: Option<&str>) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| Some(id.as_str()) != exclude)
            .filter(|id| {
                let Ok(definition) = self.resolved_definition(id) else {
                    return false;
                };
                if definition.is_abstract() {
                    return false;
                }
                match definition.class() {
                    Some(class) if class == type_name => true,
                    Some(class) => self.types.get(class).map_or(false, |ty| ty.is_a(type_name)),
                    None => false,
                }
            })
            .cloned()
            .collect()
    }

    pub(crate) fn tagged(&self, tag: &str) -> Vec<(String, Vec<TagAttributes>)> {
        self.order
            .iter()
            .filter_map(|id| {
                let occurrences = self.definitions.get(id)?.tag(tag);
                (!occurrences.is_empty()).then(|| (id.clone(), occurrences.to_vec()))
            })
            .collect()
    }

    pub(crate) fn aliases(&self) -> &BTreeMap<String, Alias> {
        &self.aliases
    }
}

/// Registry and runtime container, shared with lazy proxies
pub(crate) struct BuilderState {
    registry: RwLock<Registry>,
    container: Container,
}

impl BuilderState {
    fn missing(behavior: InvalidBehavior, error: ContainerError) -> ContainerResult<Option<Service>> {
        match behavior {
            InvalidBehavior::Raise => Err(error),
            InvalidBehavior::Null | InvalidBehavior::Ignore => Ok(None),
        }
    }

    /// Resolve `id` to a service.
    ///
    /// `external` lookups come from callers of the container rather than from
    /// other definitions, and cannot see private services.
    pub(crate) fn is_registry_locked(&self) -> bool {
        self.registry.is_locked_exclusive()
    }

    pub(crate) fn get_service(
        self: &Arc<Self>,
        id: &str,
        behavior: InvalidBehavior,
        external: bool,
    ) -> ContainerResult<Option<Service>> {
        let (target, alias_public, definition) = {
            let registry = self.registry.read();
            let (target, alias_public) = registry.resolve_alias(id)?;
            let definition = if registry.definitions.contains_key(&target) {
                Some(registry.resolved_definition(&target)?.into_owned())
            } else {
                None
            };
            (target, alias_public, definition)
        };

        let Some(definition) = definition else {
            if let Some(service) = self.container.cached(&target) {
                return Ok(Some(service));
            }
            return Self::missing(behavior, ContainerError::service_not_found(id));
        };

        if external && !alias_public.unwrap_or_else(|| definition.is_public()) {
            return Self::missing(behavior, ContainerError::private_service(id));
        }

        if definition.is_synthetic() && !self.container.is_cached(&target) {
            return Self::missing(
                behavior,
                ContainerError::SyntheticService { id: target.clone() },
            );
        }

        self.container
            .get_or_create(&target, || self.create_service(&target, definition))
            .map(Some)
    }

    fn create_service(self: &Arc<Self>, id: &str, mut definition: Definition) -> ContainerResult<Created> {
        if definition.is_synthetic() {
            return Err(ContainerError::SyntheticService { id: id.to_string() });
        }
        if definition.is_abstract() {
            return Err(ContainerError::AbstractService { id: id.to_string() });
        }
        if let Some(message) = definition.deprecation() {
            warn!(service = id, "deprecated service: {}", message);
        }

        let ty = {
            let registry = self.registry.read();
            let ty = definition.class().and_then(|class| registry.service_type(class));
            let autowire = definition.is_autowired() && definition.factory().is_none();
            if let (true, Some(ty)) = (autowire, ty.as_ref()) {
                let missing = autowire_arguments(
                    &registry,
                    ty.name(),
                    definition.arguments().len(),
                    Some(id),
                )?;
                for argument in missing {
                    definition.add_argument(argument);
                }
            }
            ty
        };

        debug!(service = id, class = ?definition.class(), "creating service");
        let arguments = self.resolve_arguments(id, definition.arguments())?;

        let mut instance = match definition.factory() {
            Some(factory) => self.invoke_factory(id, factory, &arguments)?,
            None => {
                let ty = ty.as_ref().ok_or_else(|| Self::unknown_type(id, &definition))?;
                let constructor = ty.constructor().ok_or_else(|| {
                    ContainerError::configuration(
                        format!("type \"{}\" has no constructor", ty.name()),
                        Some(id),
                    )
                })?;
                constructor(&arguments)?
            }
        };

        for call in definition.method_calls() {
            let Some(arguments) = self.resolve_call_arguments(id, &call.arguments)? else {
                debug!(service = id, method = %call.method, "method call skipped, ignored reference is missing");
                continue;
            };
            let ty = ty.as_ref().ok_or_else(|| Self::unknown_type(id, &definition))?;
            let method = ty.method(&call.method).ok_or_else(|| {
                ContainerError::configuration(
                    format!("type \"{}\" has no method \"{}\"", ty.name(), call.method),
                    Some(id),
                )
            })?;
            method(instance.as_mut(), &arguments)?;
        }

        Ok(Created {
            service: Arc::from(instance),
            shared: definition.is_shared(),
        })
    }

    fn unknown_type(id: &str, definition: &Definition) -> ContainerError {
        match definition.class() {
            Some(class) => ContainerError::configuration(
                format!("class \"{}\" is not a registered type", class),
                Some(id),
            ),
            None => ContainerError::configuration("the definition has no class and no factory", Some(id)),
        }
    }

    fn invoke_factory(
        self: &Arc<Self>,
        id: &str,
        factory: &Factory,
        arguments: &Arguments,
    ) -> ContainerResult<Instance> {
        match factory {
            Factory::Closure(factory) => factory(arguments),
            Factory::Static { class, method } => {
                let ty = self.registry.read().service_type(class);
                let factory = ty
                    .as_ref()
                    .and_then(|ty| ty.static_factory(method))
                    .ok_or_else(|| {
                        ContainerError::configuration(
                            format!("no static factory \"{}::{}\"", class, method),
                            Some(id),
                        )
                    })?;
                factory(arguments)
            }
            Factory::Service { service, method } => {
                let target = self
                    .get_service(service.id(), InvalidBehavior::Raise, false)
                    .map_err(|error| error.referenced_by(id))?
                    .ok_or_else(|| ContainerError::service_not_found(service.id()).referenced_by(id))?;

                let ty = {
                    let registry = self.registry.read();
                    let (target_id, _) = registry.resolve_alias(service.id())?;
                    registry
                        .resolved_definition(&target_id)
                        .ok()
                        .and_then(|definition| definition.class().map(str::to_string))
                        .and_then(|class| registry.service_type(&class))
                };
                let factory = ty
                    .as_ref()
                    .and_then(|ty| ty.service_factory(method))
                    .ok_or_else(|| {
                        ContainerError::configuration(
                            format!("service \"{}\" has no factory method \"{}\"", service.id(), method),
                            Some(id),
                        )
                    })?;
                factory(&target, arguments)
            }
        }
    }

    fn resolve_arguments(self: &Arc<Self>, consumer: &str, arguments: &[Argument]) -> ContainerResult<Arguments> {
        let values = arguments
            .iter()
            .map(|argument| self.resolve_argument(consumer, argument))
            .collect::<ContainerResult<Vec<_>>>()?;
        Ok(Arguments::new(consumer, values))
    }

    /// `None` when an ignore-on-missing reference cannot be satisfied
    fn resolve_call_arguments(
        self: &Arc<Self>,
        consumer: &str,
        arguments: &[Argument],
    ) -> ContainerResult<Option<Arguments>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let resolved = self.resolve_argument(consumer, argument)?;
            if let Argument::Reference(reference) = argument {
                if reference.invalid_behavior() == InvalidBehavior::Ignore && resolved.is_null() {
                    return Ok(None);
                }
            }
            values.push(resolved);
        }
        Ok(Some(Arguments::new(consumer, values)))
    }

    fn resolve_argument(self: &Arc<Self>, consumer: &str, argument: &Argument) -> ContainerResult<Resolved> {
        match argument {
            Argument::Value(value) => self
                .container
                .parameters()
                .resolve_value(value)
                .map(Resolved::Value),
            Argument::Reference(reference) => self.resolve_reference(consumer, reference),
            Argument::List(items) => items
                .iter()
                .map(|item| self.resolve_argument(consumer, item))
                .collect::<ContainerResult<Vec<_>>>()
                .map(Resolved::List),
            Argument::Map(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.resolve_argument(consumer, item)?)))
                .collect::<ContainerResult<BTreeMap<_, _>>>()
                .map(Resolved::Map),
            Argument::Tagged(tag) => {
                let ids = priority_ordered_ids(self.registry.read().tagged(tag))?;
                ids.iter()
                    .map(|id| self.resolve_reference(consumer, &Reference::new(id.clone())))
                    .collect::<ContainerResult<Vec<_>>>()
                    .map(Resolved::List)
            }
        }
    }

    fn resolve_reference(self: &Arc<Self>, consumer: &str, reference: &Reference) -> ContainerResult<Resolved> {
        let lazy_target = {
            let registry = self.registry.read();
            let (target, _) = registry.resolve_alias(reference.id())?;
            let lazy = registry
                .definitions
                .contains_key(&target)
                .then(|| registry.resolved_definition(&target))
                .transpose()?
                .map_or(false, |definition| definition.is_lazy());
            lazy.then_some(target)
        };

        if let Some(target) = lazy_target {
            if !self.container.is_cached(&target) {
                debug!(consumer, service = %target, "injecting lazy proxy");
                return Ok(Resolved::Lazy(LazyService::deferred(target, self)));
            }
        }

        match self.get_service(reference.id(), reference.invalid_behavior(), false) {
            Ok(Some(service)) => Ok(Resolved::Service(service)),
            Ok(None) => Ok(Resolved::Value(Value::Null)),
            Err(error) => Err(error.referenced_by(consumer)),
        }
    }
}

/// Mutable registry of service definitions that compiles into a frozen container
pub struct ContainerBuilder {
    state: Arc<BuilderState>,
    passes: Vec<Box<dyn CompilerPass>>,
    default_passes: bool,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BuilderState {
                registry: RwLock::new(Registry::default()),
                container: Container::new(),
            }),
            passes: Vec::new(),
            default_passes: true,
        }
    }

    /// Skip the built-in passes (inheritance, autowiring, checks) on compile
    pub fn without_default_passes(mut self) -> Self {
        self.default_passes = false;
        self
    }

    fn registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.state.registry.read()
    }

    fn registry_mut(&mut self, operation: &str) -> ContainerResult<RwLockWriteGuard<'_, Registry>> {
        let registry = self.state.registry.write();
        registry.ensure_not_compiled(operation)?;
        Ok(registry)
    }

    pub fn register_type(&mut self, service_type: ServiceType) -> ContainerResult<()> {
        let mut registry = self.registry_mut("register a type")?;
        debug!(class = service_type.name(), "type registered");
        registry
            .types
            .insert(service_type.name().to_string(), Arc::new(service_type));
        Ok(())
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.registry().types.contains_key(name)
    }

    /// Register a service; without a class the id doubles as the class name
    pub fn register(
        &mut self,
        id: impl Into<String>,
        class: Option<&str>,
    ) -> ContainerResult<DefinitionMut<'_>> {
        let id = id.into();
        let class = class.map_or_else(|| id.clone(), str::to_string);
        self.set_definition(id, Definition::of(class))
    }

    /// Register `T` under its type name as an autowired service
    pub fn register_autowired<T: Autowire>(&mut self) -> ContainerResult<DefinitionMut<'_>> {
        self.register_type(ServiceType::autowired::<T>())?;
        let mut definition = self.register(type_name::<T>(), None)?;
        definition.set_autowired(true);
        Ok(definition)
    }

    pub fn set_definition(
        &mut self,
        id: impl Into<String>,
        definition: Definition,
    ) -> ContainerResult<DefinitionMut<'_>> {
        let id = id.into();
        let mut registry = self.registry_mut("register a service")?;
        debug!(service = %id, class = ?definition.class(), "definition registered");
        registry.insert_definition(id.clone(), definition);
        RwLockWriteGuard::try_map(registry, |registry| registry.definitions.get_mut(&id))
            .map_err(|_| ContainerError::service_not_found(id.as_str()))
    }

    pub fn get_definition(&self, id: &str) -> ContainerResult<DefinitionRef<'_>> {
        RwLockReadGuard::try_map(self.registry(), |registry| registry.definitions.get(id))
            .map_err(|_| ContainerError::service_not_found(id))
    }

    /// Like [`ContainerBuilder::get_definition`], following aliases
    pub fn find_definition(&self, id: &str) -> ContainerResult<DefinitionRef<'_>> {
        let (target, _) = self.registry().resolve_alias(id)?;
        self.get_definition(&target)
    }

    /// Holds the registry write lock until the guard is dropped. Forcing a
    /// [`LazyService`](crate::LazyService) meanwhile fails instead of blocking.
    pub fn get_definition_mut(&mut self, id: &str) -> ContainerResult<DefinitionMut<'_>> {
        let registry = self.registry_mut("modify a definition")?;
        RwLockWriteGuard::try_map(registry, |registry| registry.definitions.get_mut(id))
            .map_err(|_| ContainerError::service_not_found(id))
    }

    pub fn has_definition(&self, id: &str) -> bool {
        self.registry().definitions.contains_key(id)
    }

    pub fn remove_definition(&mut self, id: &str) -> ContainerResult<Option<Definition>> {
        let mut registry = self.registry_mut("remove a definition")?;
        debug!(service = id, "definition removed");
        Ok(registry.remove_definition(id))
    }

    /// Definition ids in registration order
    pub fn definition_ids(&self) -> Vec<String> {
        self.registry().ids().to_vec()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>, target: impl Into<Alias>) -> ContainerResult<()> {
        let alias = alias.into();
        let target = target.into();
        let mut registry = self.registry_mut("set an alias")?;

        if alias == target.id {
            return Err(ContainerError::AliasCircularReference {
                path: vec![alias.clone(), alias],
            });
        }

        if registry.definitions.contains_key(&alias) {
            registry.remove_definition(&alias);
        }
        debug!(alias = %alias, target = %target.id, "alias registered");
        let previous = registry.aliases.insert(alias.clone(), target);

        if let Err(error) = registry.resolve_alias(&alias) {
            match previous {
                Some(previous) => registry.aliases.insert(alias, previous),
                None => registry.aliases.remove(&alias),
            };
            return Err(error);
        }
        Ok(())
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.registry().has_alias(alias)
    }

    pub fn get_alias(&self, alias: &str) -> Option<Alias> {
        self.registry().aliases.get(alias).cloned()
    }

    pub fn remove_alias(&mut self, alias: &str) -> ContainerResult<Option<Alias>> {
        Ok(self.registry_mut("remove an alias")?.aliases.remove(alias))
    }

    pub fn aliases(&self) -> BTreeMap<String, Alias> {
        self.registry().aliases().clone()
    }

    pub fn add_compiler_pass(&mut self, pass: impl CompilerPass + 'static) -> ContainerResult<()> {
        self.registry().ensure_not_compiled("add a compiler pass")?;
        debug!(pass = pass.name(), "compiler pass added");
        self.passes.push(Box::new(pass));
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.registry().compiled
    }

    /// Run every compiler pass once, in registration order, then freeze.
    ///
    /// Built-in passes run after the user passes. A second call does nothing.
    /// When a pass fails the builder stays uncompiled. Passes that already ran,
    /// the failing one included, are not run again; passes queued behind it
    /// run on the next call.
    pub fn compile(&mut self) -> ContainerResult<()> {
        if self.is_compiled() {
            debug!("container already compiled");
            return Ok(());
        }

        let started = Instant::now();
        let mut executed = 0usize;

        // Passes may register further passes while running
        while !self.passes.is_empty() {
            let mut pass = self.passes.remove(0);
            self.run_pass(pass.as_mut())?;
            executed += 1;
        }

        if self.default_passes {
            for mut pass in default_passes() {
                self.run_pass(pass.as_mut())?;
                executed += 1;
            }
        }

        let (definitions, aliases) = {
            let mut registry = self.state.registry.write();
            registry.compiled = true;
            (registry.definitions.len(), registry.aliases.len())
        };
        self.state.container.parameters().freeze();

        info!(
            definitions,
            aliases,
            passes = executed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "container compiled"
        );
        Ok(())
    }

    fn run_pass(&mut self, pass: &mut dyn CompilerPass) -> ContainerResult<()> {
        let name = pass.name().to_string();
        debug!(pass = %name, "running compiler pass");
        pass.process(self).map_err(|error| {
            error!(pass = %name, error = %error, "compiler pass failed");
            error
        })
    }

    /// Every service carrying `tag`, in registration order, with all its attribute sets
    pub fn find_tagged_service_ids(&self, tag: &str) -> Vec<(String, Vec<TagAttributes>)> {
        self.registry().tagged(tag)
    }

    /// Tag occurrences ordered by the `priority` attribute, highest first
    pub fn find_tagged_services_by_priority(&self, tag: &str) -> ContainerResult<Vec<TaggedService>> {
        sort_by_priority(self.find_tagged_service_ids(tag))
    }

    /// Constructor arguments for a registered type, as references and literals
    pub fn autowire(&self, type_name: &str) -> ContainerResult<Vec<Argument>> {
        autowire_arguments(&self.registry(), type_name, 0, None)
    }

    pub(crate) fn autowire_definition(&self, id: &str) -> ContainerResult<Option<Vec<Argument>>> {
        let registry = self.registry();
        let definition = registry.resolved_definition(id)?;
        if !definition.is_autowired()
            || definition.factory().is_some()
            || definition.is_abstract()
            || definition.is_synthetic()
        {
            return Ok(None);
        }
        let Some(class) = definition.class() else {
            return Ok(None);
        };
        if registry.service_type(class).is_none() {
            return Ok(None);
        }
        autowire_arguments(&registry, class, definition.arguments().len(), Some(id)).map(Some)
    }

    pub(crate) fn resolved_definition(&self, id: &str) -> ContainerResult<Definition> {
        self.registry().resolved_definition(id).map(Cow::into_owned)
    }

    pub(crate) fn service_type(&self, name: &str) -> Option<Arc<ServiceType>> {
        self.registry().service_type(name)
    }

    /// Whether `id` names a definition, directly or through aliases
    pub(crate) fn resolves_to_definition(&self, id: &str) -> bool {
        let registry = self.registry();
        registry
            .resolve_alias(id)
            .map_or(false, |(target, _)| registry.definitions.contains_key(&target))
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> ContainerResult<()> {
        self.state.container.set_parameter(name, value)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.state.container.has_parameter(name)
    }

    pub fn parameters(&self) -> BTreeMap<String, Value> {
        self.state.container.parameters().all()
    }

    /// Resolve a service with an explicit missing-service policy
    pub fn get_with(&self, id: &str, behavior: InvalidBehavior) -> ContainerResult<Option<Service>> {
        self.state.get_service(id, behavior, true)
    }

    /// The runtime cache and parameters
    pub fn container(&self) -> &Container {
        &self.state.container
    }

    pub fn stats(&self) -> ContainerStats {
        let registry = self.registry();
        ContainerStats {
            definitions: registry.definitions.len(),
            aliases: registry.aliases.len(),
            ..self.state.container.stats()
        }
    }

    pub fn dependency_graph(&self) -> ServiceGraph {
        ServiceGraph::from_registry(&self.registry())
    }

    pub fn dependency_report(&self) -> String {
        self.dependency_graph().report()
    }
}

impl ServiceLocator for ContainerBuilder {
    fn get(&self, id: &str) -> ContainerResult<Service> {
        self.state
            .get_service(id, InvalidBehavior::Raise, true)?
            .ok_or_else(|| ContainerError::service_not_found(id))
    }

    fn has(&self, id: &str) -> bool {
        let registry = self.registry();
        let Ok((target, alias_public)) = registry.resolve_alias(id) else {
            return false;
        };
        match registry.resolved_definition(&target) {
            Ok(definition) => alias_public.unwrap_or_else(|| definition.is_public()),
            Err(_) => self.state.container.is_cached(&target),
        }
    }

    fn set(&self, id: &str, service: Service) -> ContainerResult<()> {
        let target = {
            let registry = self.registry();
            let (target, _) = registry.resolve_alias(id)?;
            if let Some(definition) = registry.definition(&target) {
                if registry.compiled && !definition.is_synthetic() {
                    return Err(ContainerError::frozen(format!(
                        "replace the initialized service \"{}\"",
                        target
                    )));
                }
            }
            target
        };
        self.state.container.store(&target, service);
        Ok(())
    }

    fn get_parameter(&self, name: &str) -> ContainerResult<Value> {
        self.state.container.parameters().get(name)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        f.debug_struct("ContainerBuilder")
            .field("definitions", &registry.order)
            .field("aliases", &registry.aliases)
            .field("pending_passes", &self.passes.len())
            .field("compiled", &registry.compiled)
            .finish()
    }
}
