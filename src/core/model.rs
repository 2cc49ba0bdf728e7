//! Registry of entity metadata
//!
//! Definitions are stored raw when added and built into [`Entity`] values on
//! first access. Built entities are memoized, so every lookup of a name
//! returns the same `Arc<Entity>` (and therefore the same `Arc<Action>`s).

use crate::config::ModelConfig;
use crate::core::action::{Action, ActionDefinition};
use crate::core::entity::{Entity, EntityDefinition, Name};
use crate::core::error::{ConfigError, NavResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Front name of the placeholder entity and action used by custom menu entries
pub const DUMMY_FRONT: &str = "ng-dummy";
/// Back name of the placeholder entity and action
pub const DUMMY_BACK: &str = "NG_DUMMY";

/// Registry of entity definitions, built lazily
#[derive(Debug, Default)]
pub struct EntityModel {
    definitions: RwLock<HashMap<String, EntityDefinition>>,
    entities: RwLock<HashMap<String, Arc<Entity>>>,
}

impl EntityModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model holding every entity of a configuration
    pub fn from_config(config: &ModelConfig) -> Self {
        let model = Self::new();
        for definition in &config.entities {
            model.add_entity(definition.clone());
        }
        model
    }

    /// Store a definition under its front name
    ///
    /// Nothing is built until the entity is first requested. Re-adding a name
    /// replaces the definition and drops any entity already built from it.
    pub fn add_entity(&self, definition: EntityDefinition) {
        let name = definition.name.front.clone();
        self.entities.write().remove(&name);
        self.definitions.write().insert(name, definition);
    }

    /// Whether a definition was added under this name
    pub fn contains(&self, entity_name: &str) -> bool {
        entity_name == DUMMY_FRONT || self.definitions.read().contains_key(entity_name)
    }

    /// Entity with the given front name
    pub fn entity(&self, entity_name: &str) -> NavResult<Arc<Entity>> {
        if entity_name == DUMMY_FRONT {
            return Ok(self.dummy_entity());
        }
        if let Some(entity) = self.entities.read().get(entity_name) {
            return Ok(entity.clone());
        }

        let definition = self
            .definitions
            .read()
            .get(entity_name)
            .cloned()
            .ok_or_else(|| {
                tracing::error!(entity = entity_name, "unknown entity requested");
                ConfigError::UnknownEntity {
                    entity: entity_name.to_string(),
                }
            })?;

        let mut entities = self.entities.write();
        let entity = entities
            .entry(entity_name.to_string())
            .or_insert_with(|| {
                tracing::debug!(entity = entity_name, "building entity");
                Arc::new(Entity::build(definition))
            })
            .clone();
        Ok(entity)
    }

    /// Action of an entity, both given by front name
    pub fn action(&self, entity_name: &str, action_name: &str) -> NavResult<Arc<Action>> {
        self.entity(entity_name)?
            .action(action_name)
            .ok_or_else(|| {
                ConfigError::UnknownAction {
                    entity: entity_name.to_string(),
                    action: action_name.to_string(),
                }
                .into()
            })
    }

    /// Placeholder entity holding a single no-op action
    pub fn dummy_entity(&self) -> Arc<Entity> {
        if let Some(entity) = self.entities.read().get(DUMMY_FRONT) {
            return entity.clone();
        }
        let name = Name::new(DUMMY_FRONT, DUMMY_BACK);
        let definition = EntityDefinition {
            name: name.clone(),
            pk: Vec::new(),
            pk_map: HashMap::new(),
            actions: vec![ActionDefinition::named(name)],
            links: Vec::new(),
            queries: Vec::new(),
            allowed_values: HashMap::new(),
        };
        self.entities
            .write()
            .entry(DUMMY_FRONT.to_string())
            .or_insert_with(|| Arc::new(Entity::build(definition)))
            .clone()
    }

    /// The no-op action of the placeholder entity
    pub fn dummy_action(&self) -> Arc<Action> {
        let entity = self.dummy_entity();
        match entity.action(DUMMY_FRONT) {
            Some(action) => action,
            None => Arc::new(Action::new(
                ActionDefinition::named(entity.name().clone()),
                entity.name().clone(),
            )),
        }
    }

    /// Front names of every added entity
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }
}
