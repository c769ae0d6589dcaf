use once_cell::sync::OnceCell;
use std::{
    any::Any,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    argument::{downcast_service, Service},
    builder::BuilderState,
    errors::{ContainerError, ContainerResult},
    reference::InvalidBehavior,
};

/// Proxy injected in place of a lazy service.
///
/// The real instance is created through the container on the first
/// [`LazyService::get`], so sharing and cycle detection apply as usual.
#[derive(Clone)]
pub struct LazyService {
    id: String,
    source: Option<Weak<BuilderState>>,
    cell: Arc<OnceCell<Service>>,
}

impl LazyService {
    pub(crate) fn deferred(id: impl Into<String>, state: &Arc<BuilderState>) -> Self {
        Self {
            id: id.into(),
            source: Some(Arc::downgrade(state)),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Already initialized proxy around an existing service
    pub fn from_service(id: impl Into<String>, service: Service) -> Self {
        Self {
            id: id.into(),
            source: None,
            cell: Arc::new(OnceCell::with_value(service)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Resolve the service, once.
    ///
    /// Fails with `Configuration` while a definition is borrowed mutably from
    /// the owning builder.
    pub fn get(&self) -> ContainerResult<Service> {
        if let Some(service) = self.cell.get() {
            return Ok(service.clone());
        }

        let state = self
            .source
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                ContainerError::configuration(
                    "the container owning this lazy service has been dropped",
                    Some(self.id.as_str()),
                )
            })?;

        if state.is_registry_locked() {
            return Err(ContainerError::configuration(
                "the registry is locked for modification",
                Some(self.id.as_str()),
            ));
        }

        // Resolve outside the cell: construction may re-enter other proxies
        let service = state
            .get_service(&self.id, InvalidBehavior::Raise, false)?
            .ok_or_else(|| ContainerError::service_not_found(self.id.as_str()))?;

        Ok(self.cell.get_or_init(|| service).clone())
    }

    pub fn get_typed<T>(&self) -> ContainerResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        downcast_service(self.get()?, &self.id)
    }
}

impl fmt::Debug for LazyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyService")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
