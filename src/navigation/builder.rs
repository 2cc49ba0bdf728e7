//! NavigatorBuilder for wiring a navigator from its collaborators

use super::navigator::Navigator;
use crate::config::{ModelConfig, NavigatorConfig};
use crate::context::NavigationStore;
use crate::core::auth::{SecurityService, SessionSecurity};
use crate::core::customization::CustomizationRegistry;
use crate::core::events::EventBus;
use crate::core::hooks::{ACTION_COMPONENT, VALIDATE_ACTION, register_defaults};
use crate::core::model::EntityModel;
use crate::core::service::RestGateway;
use crate::storage::{Location, MemoryLocation, MemorySessionStorage, SessionStorage};
use anyhow::Result;
use std::sync::Arc;

/// Builder assembling the store, the hooks and the gateways of a navigator
///
/// Anything not given gets an in-memory default: session storage,
/// location at `/`, and a session-backed security service.
///
/// # Example
///
/// ```ignore
/// let navigator = NavigatorBuilder::new()
///     .with_model(ModelConfig::from_yaml_file("model.yaml")?)
///     .with_rest_gateway(InMemoryRestGateway::new(model))
///     .with_event_bus(256)
///     .build()?;
/// ```
pub struct NavigatorBuilder {
    models: Vec<ModelConfig>,
    entity_model: Option<Arc<EntityModel>>,
    registry: Option<Arc<CustomizationRegistry>>,
    storage: Option<Arc<dyn SessionStorage>>,
    location: Option<Arc<dyn Location>>,
    security: Option<Arc<dyn SecurityService>>,
    rest: Option<Arc<dyn RestGateway>>,
    event_bus: Option<EventBus>,
    config: NavigatorConfig,
}

impl NavigatorBuilder {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            entity_model: None,
            registry: None,
            storage: None,
            location: None,
            security: None,
            rest: None,
            event_bus: None,
            config: NavigatorConfig::default(),
        }
    }

    /// Add entity definitions; later definitions replace earlier ones
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.models.push(model);
        self
    }

    /// Use an already built entity model, ignoring `with_model` definitions
    pub fn with_entity_model(mut self, model: Arc<EntityModel>) -> Self {
        self.entity_model = Some(model);
        self
    }

    /// Share a registry holding application overrides
    ///
    /// Built-in defaults are installed on it when missing.
    pub fn with_registry(mut self, registry: Arc<CustomizationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_security(mut self, security: Arc<dyn SecurityService>) -> Self {
        self.security = Some(security);
        self
    }

    /// Set the REST gateway (required unless `backend_url` is configured)
    pub fn with_rest_gateway(mut self, rest: impl RestGateway + 'static) -> Self {
        self.rest = Some(Arc::new(rest));
        self
    }

    pub fn with_shared_rest_gateway(mut self, rest: Arc<dyn RestGateway>) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Publish navigation events on a bus of the given capacity
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    pub fn with_config(mut self, config: NavigatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the navigator
    pub fn build(self) -> Result<Navigator> {
        let model = match self.entity_model {
            Some(model) => model,
            None => {
                let merged = self
                    .models
                    .into_iter()
                    .fold(ModelConfig::default(), ModelConfig::merge);
                Arc::new(EntityModel::from_config(&merged))
            }
        };

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(CustomizationRegistry::new()));
        if !registry.has_default(VALIDATE_ACTION, ACTION_COMPONENT) {
            register_defaults(&registry, model.clone());
        }

        let events = self.event_bus.unwrap_or_default();
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemorySessionStorage::new()));
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(MemoryLocation::default()));
        let security = match self.security {
            Some(security) => security,
            None => Arc::new(
                SessionSecurity::new(storage.clone(), self.config.disable_security)
                    .with_events(events.clone()),
            ),
        };

        let rest = match self.rest {
            Some(rest) => rest,
            None => default_gateway(&self.config, &model, &storage)?,
        };

        tracing::debug!(
            session_key = %self.config.session_key,
            context_param = %self.config.context_param,
            "navigator built"
        );
        let store = NavigationStore::new(
            model,
            registry,
            storage,
            location,
            security,
            events,
            self.config,
        );
        Ok(Navigator::new(Arc::new(store), rest))
    }
}

impl Default for NavigatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
fn default_gateway(
    config: &NavigatorConfig,
    model: &Arc<EntityModel>,
    storage: &Arc<dyn SessionStorage>,
) -> Result<Arc<dyn RestGateway>> {
    let url = config.backend_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("RestGateway is required. Call .with_rest_gateway() or set backend_url")
    })?;
    let security = Arc::new(SessionSecurity::new(storage.clone(), config.disable_security));
    let gateway = crate::storage::HttpRestGateway::new(url, model.clone())?.with_session(security);
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "http"))]
fn default_gateway(
    _config: &NavigatorConfig,
    _model: &Arc<EntityModel>,
    _storage: &Arc<dyn SessionStorage>,
) -> Result<Arc<dyn RestGateway>> {
    Err(anyhow::anyhow!("RestGateway is required. Call .with_rest_gateway()"))
}
