//! Runtime container: instance cache, parameters and cycle detection.
//!
//! First construction of any service is serialized through one reentrant
//! lock. The same lock guards the loading stack, so a dependency resolved on
//! the constructing thread re-enters freely while other threads wait and then
//! find the instance in the cache.

use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value;
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, trace};

use crate::{
    argument::{downcast_service, Service},
    errors::{ContainerError, ContainerResult},
    parameters::ParameterBag,
};

/// Read access to services and parameters
pub trait ServiceLocator {
    fn get(&self, id: &str) -> ContainerResult<Service>;

    fn has(&self, id: &str) -> bool;

    /// Store a ready-made instance (the way synthetic services are supplied)
    fn set(&self, id: &str, service: Service) -> ContainerResult<()>;

    fn get_parameter(&self, name: &str) -> ContainerResult<Value>;

    fn get_typed<T>(&self, id: &str) -> ContainerResult<Arc<T>>
    where
        T: Any + Send + Sync,
        Self: Sized,
    {
        downcast_service(self.get(id)?, id)
    }
}

/// Outcome of a construction hook
pub(crate) struct Created {
    pub service: Service,
    pub shared: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerStats {
    pub definitions: usize,
    pub aliases: usize,
    pub cached_services: usize,
    pub resolutions: u64,
    pub cache_hits: u64,
    pub constructions: u64,
    pub failures: u64,
}

impl ContainerStats {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / self.resolutions as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    constructions: AtomicU64,
    failures: AtomicU64,
}

/// Pops the loading stack when construction ends, successful or not
struct LoadingGuard<'a> {
    stack: &'a RefCell<Vec<String>>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

pub struct Container {
    services: RwLock<HashMap<String, Service>>,
    parameters: ParameterBag,
    loading: ReentrantMutex<RefCell<Vec<String>>>,
    counters: Counters,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            parameters: ParameterBag::new(),
            loading: ReentrantMutex::new(RefCell::new(Vec::new())),
            counters: Counters::default(),
        }
    }

    pub fn parameters(&self) -> &ParameterBag {
        &self.parameters
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> ContainerResult<()> {
        self.parameters.set(name, value)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.has(name)
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.services.read().contains_key(id)
    }

    pub(crate) fn cached(&self, id: &str) -> Option<Service> {
        self.services.read().get(id).cloned()
    }

    pub(crate) fn store(&self, id: &str, service: Service) {
        debug!(service = id, "service stored");
        self.services.write().insert(id.to_string(), service);
    }

    pub fn cached_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.services.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids currently under construction, outermost first
    pub fn loading(&self) -> Vec<String> {
        self.loading.lock().borrow().clone()
    }

    /// Cached instance of `id`, or the result of `create`, stored when shared.
    ///
    /// Fails with `CircularDependency` when `id` is already being constructed
    /// on this thread; the path starts and ends with `id`.
    pub(crate) fn get_or_create<F>(&self, id: &str, create: F) -> ContainerResult<Service>
    where
        F: FnOnce() -> ContainerResult<Created>,
    {
        self.counters.resolutions.fetch_add(1, Ordering::Relaxed);
        if let Some(service) = self.cached(id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            trace!(service = id, "cache hit");
            return Ok(service);
        }

        let loading = self.loading.lock();

        // Another thread may have finished the construction while we waited
        if let Some(service) = self.cached(id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(service);
        }

        {
            let mut stack = loading.borrow_mut();
            if let Some(position) = stack.iter().position(|entry| entry == id) {
                let mut path = stack[position..].to_vec();
                path.push(id.to_string());
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                return Err(ContainerError::CircularDependency { path });
            }
            stack.push(id.to_string());
        }
        let _guard = LoadingGuard { stack: &loading };

        match create() {
            Ok(Created { service, shared }) => {
                self.counters.constructions.fetch_add(1, Ordering::Relaxed);
                if shared {
                    self.store(id, service.clone());
                }
                Ok(service)
            }
            Err(error) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            definitions: 0,
            aliases: 0,
            cached_services: self.services.read().len(),
            resolutions: self.counters.resolutions.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl ServiceLocator for Container {
    /// A plain container knows no definitions: only `set()` services exist
    fn get(&self, id: &str) -> ContainerResult<Service> {
        self.get_or_create(id, || Err(ContainerError::service_not_found(id)))
    }

    fn has(&self, id: &str) -> bool {
        self.is_cached(id)
    }

    fn set(&self, id: &str, service: Service) -> ContainerResult<()> {
        self.store(id, service);
        Ok(())
    }

    fn get_parameter(&self, name: &str) -> ContainerResult<Value> {
        self.parameters.get(name)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.cached_ids())
            .field("parameters", &self.parameters)
            .finish()
    }
}
