//! Entity metadata and primary key serialization

use crate::core::action::{Action, ActionDefinition};
use crate::core::field::{FieldValue, KeyTag};
use crate::core::link::{Link, LinkDefinition};
use crate::core::query::{Query, QueryDefinition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const SEPARATOR_FIELDS: &str = ",,,";
const SEPARATOR_VALUE_KEY: &str = ":::";
const DEFAULT_KEY_TAG: &str = "S";

/// Front/back pair naming an entity, action, link or query
///
/// The front name is used in paths and by the UI, the back name is the one
/// the backend and the security functions know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    pub front: String,
    pub back: String,
}

impl Name {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// One allowed value of an enumerated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowedValue {
    pub code: String,
    pub value: Value,
}

/// Raw declaration of an entity, as found in the model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: Name,

    /// Fields forming the primary key, in key order
    #[serde(default)]
    pub pk: Vec<String>,

    /// Type tag of each primary key field (`I`, `F`, `L`, `B`, or text)
    #[serde(rename = "pkMap", default)]
    pub pk_map: HashMap<String, String>,

    #[serde(default)]
    pub actions: Vec<ActionDefinition>,

    #[serde(default)]
    pub links: Vec<LinkDefinition>,

    #[serde(default)]
    pub queries: Vec<QueryDefinition>,

    #[serde(rename = "allowedValues", default)]
    pub allowed_values: HashMap<String, Vec<AllowedValue>>,
}

/// Primary key of an entity instance, field name to value in key order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey(IndexMap<String, FieldValue>);

impl PrimaryKey {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Values in key order
    pub fn values(&self) -> Vec<FieldValue> {
        self.0.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for PrimaryKey {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A built entity: its actions, links and queries plus the key codec
#[derive(Debug)]
pub struct Entity {
    name: Name,
    pk: Vec<String>,
    pk_map: HashMap<String, String>,
    actions: IndexMap<String, Arc<Action>>,
    links: IndexMap<String, Arc<Link>>,
    queries: IndexMap<String, Query>,
    allowed_values: HashMap<String, Vec<AllowedValue>>,
}

impl Entity {
    /// Build an entity and its children from its raw declaration
    pub fn build(definition: EntityDefinition) -> Self {
        let EntityDefinition {
            name,
            pk,
            pk_map,
            actions,
            links,
            queries,
            allowed_values,
        } = definition;

        let actions = actions
            .into_iter()
            .map(|def| (def.name.front.clone(), Arc::new(Action::new(def, name.clone()))))
            .collect();
        let links = links
            .into_iter()
            .map(|def| (def.name.front.clone(), Arc::new(Link::new(def, name.clone()))))
            .collect();
        let queries = queries
            .into_iter()
            .map(|def| (def.name.front.clone(), Query::new(def, name.clone())))
            .collect();

        Self {
            name,
            pk,
            pk_map,
            actions,
            links,
            queries,
            allowed_values,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Fields forming the primary key
    pub fn pk(&self) -> &[String] {
        &self.pk
    }

    pub fn action(&self, action_name: &str) -> Option<Arc<Action>> {
        self.actions.get(action_name).cloned()
    }

    /// All actions, in declaration order
    pub fn actions(&self) -> Vec<Arc<Action>> {
        self.actions.values().cloned().collect()
    }

    pub fn link(&self, link_name: &str) -> Option<Arc<Link>> {
        self.links.get(link_name).cloned()
    }

    pub fn links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.links.values()
    }

    pub fn query(&self, query_name: &str) -> Option<&Query> {
        self.queries.get(query_name)
    }

    /// Allowed values of a field, empty when the field is not enumerated
    pub fn allowed_values(&self, field: &str) -> &[AllowedValue] {
        self.allowed_values
            .get(field)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Translation key of each allowed value of a field, with its value
    ///
    /// Keys follow `{entity}.{field}-{code}`.
    pub fn allowed_value_keys(&self, field: &str) -> Vec<(String, Value)> {
        self.allowed_values(field)
            .iter()
            .map(|allowed| {
                (
                    format!("{}.{}-{}", self.name.front, field, allowed.code),
                    allowed.value.clone(),
                )
            })
            .collect()
    }

    /// Extract the primary key fields of a bean
    ///
    /// Missing fields are extracted as `Null`.
    pub fn extract_primary_key(&self, bean: &Value) -> PrimaryKey {
        self.pk
            .iter()
            .map(|field| {
                let value = bean
                    .get(field)
                    .map(FieldValue::from_json)
                    .unwrap_or(FieldValue::Null);
                (field.clone(), value)
            })
            .collect()
    }

    /// Serialize key values, given in key order
    ///
    /// Each field becomes `field:::{tag}{value}`, fields are joined by
    /// `,,,`. Returns `None` when fewer values than key fields are given.
    pub fn get_string_primary_key(&self, fields: &[FieldValue]) -> Option<String> {
        if self.pk.len() > fields.len() {
            return None;
        }
        let prepared: Vec<String> = self
            .pk
            .iter()
            .zip(fields)
            .map(|(field, value)| {
                let tag = self
                    .pk_map
                    .get(field)
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_KEY_TAG);
                format!("{}{}{}{}", field, SEPARATOR_VALUE_KEY, tag, value)
            })
            .collect();
        Some(prepared.join(SEPARATOR_FIELDS))
    }

    /// Serialize the primary key of a bean, if it is complete
    pub fn string_primary_key_of(&self, bean: &Value) -> Option<String> {
        if !self.is_primary_key_full(bean) {
            return None;
        }
        self.get_string_primary_key(&self.extract_primary_key(bean).values())
    }

    /// Inverse of [`Entity::get_string_primary_key`], coercing each value by its tag
    pub fn get_primary_key_from_string(&self, serialized: &str) -> Option<PrimaryKey> {
        if serialized.is_empty() {
            return None;
        }
        let mut primary_key = PrimaryKey::new();
        for field in serialized.split(SEPARATOR_FIELDS) {
            let parts: Vec<&str> = field.split(SEPARATOR_VALUE_KEY).collect();
            if let [name, tagged] = parts.as_slice() {
                let tag = KeyTag::from_prefix(tagged);
                let raw = tagged.char_indices().nth(1).map_or("", |(i, _)| &tagged[i..]);
                primary_key.insert(*name, tag.coerce(raw));
            }
        }
        if primary_key.is_empty() {
            None
        } else {
            Some(primary_key)
        }
    }

    /// Whether every primary key field of the bean is set
    pub fn is_primary_key_full(&self, bean: &Value) -> bool {
        self.extract_primary_key(bean)
            .iter()
            .all(|(_, value)| value.is_set())
    }
}
