//! Links between entities
//!
//! A link relates a source entity to a destination entity through a map of
//! foreign-key fields. Associative links go through a junction entity and
//! never touch foreign keys directly.
//!
//! Links only hold entity *names*. The destination and junction entities are
//! resolved through the [`EntityModel`] when needed, which keeps the model
//! free of reference cycles.

use crate::core::entity::Name;
use crate::core::error::{ConfigError, NavResult};
use crate::core::field::FieldValue;
use crate::core::model::EntityModel;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Junction entity and link of an associative link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociativeReference {
    pub entity: String,
    pub link: String,
}

/// Raw declaration of a link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub name: Name,

    /// Front name of the destination entity
    pub entity: String,

    /// Destination field to source field, e.g. `{"creator": "id"}`
    #[serde(default)]
    pub fk: IndexMap<String, String>,

    #[serde(default)]
    pub associative: Option<AssociativeReference>,
}

/// A link declared on an entity
#[derive(Debug, Clone)]
pub struct Link {
    name: Name,
    src_entity: Name,
    dst_entity: String,
    fk: IndexMap<String, String>,
    associative: Option<AssociativeReference>,
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.src_entity.front == other.src_entity.front && self.name.front == other.name.front
    }
}

impl Link {
    pub fn new(definition: LinkDefinition, src_entity: Name) -> Self {
        Self {
            name: definition.name,
            src_entity,
            dst_entity: definition.entity,
            fk: definition.fk,
            associative: definition.associative,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Entity declaring the link
    pub fn src_entity(&self) -> &Name {
        &self.src_entity
    }

    /// Front name of the destination entity
    pub fn dst_entity(&self) -> &str {
        &self.dst_entity
    }

    pub fn fk(&self) -> &IndexMap<String, String> {
        &self.fk
    }

    pub fn associative(&self) -> Option<&AssociativeReference> {
        self.associative.as_ref()
    }

    pub fn is_associative(&self) -> bool {
        self.associative.is_some()
    }

    /// Copy the key of `src` into the foreign-key fields of `dst`
    ///
    /// Without a source every foreign-key field is reset to null. Associative
    /// links are left untouched.
    pub fn set_linked_entity(&self, src: Option<&Value>, dst: &mut Value) {
        if self.is_associative() {
            return;
        }
        let Some(fields) = dst.as_object_mut() else {
            return;
        };
        for (fk_field, src_field) in &self.fk {
            let value = src
                .and_then(|bean| bean.get(src_field))
                .cloned()
                .unwrap_or(Value::Null);
            fields.insert(fk_field.clone(), value);
        }
    }

    /// Serialized key of the destination entity referenced by `bean`
    ///
    /// Returns `None` for associative links or when a foreign-key field of
    /// the bean is null or missing.
    pub fn string_pk_link_entity(
        &self,
        bean: &Value,
        model: &EntityModel,
    ) -> NavResult<Option<String>> {
        if self.is_associative() {
            return Ok(None);
        }
        let values: Vec<FieldValue> = self
            .fk
            .keys()
            .filter_map(|field| bean.get(field))
            .filter(|value| !value.is_null())
            .map(FieldValue::from_json)
            .collect();
        if values.len() != self.fk.len() {
            return Ok(None);
        }
        let dst = model.entity(&self.dst_entity)?;
        Ok(dst.get_string_primary_key(&values))
    }

    /// Link of the junction entity this associative link goes through
    pub fn associative_link(&self, model: &EntityModel) -> NavResult<Option<Arc<Link>>> {
        let Some(associative) = &self.associative else {
            return Ok(None);
        };
        let dst = model.entity(&self.dst_entity)?;
        match dst.link(&associative.link) {
            Some(link) => Ok(Some(link)),
            None => Err(ConfigError::UnknownLink {
                entity: self.dst_entity.clone(),
                link: associative.link.clone(),
            }
            .into()),
        }
    }
}
