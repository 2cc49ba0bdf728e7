//! In-memory backends for testing and development

use crate::core::action::Action;
use crate::core::error::{NavResult, RestError};
use crate::core::link::Link;
use crate::core::model::EntityModel;
use crate::core::query::QueryParams;
use crate::core::service::{ActionTarget, ListResult, RestGateway, RestResponse};
use crate::storage::{Location, SessionStorage};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// In-memory session storage
///
/// Useful for testing and development.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> NavResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> NavResult<()> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> NavResult<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> NavResult<()> {
        self.values.write().clear();
        Ok(())
    }
}

/// In-memory location recording every navigation
#[derive(Debug)]
pub struct MemoryLocation {
    url: RwLock<String>,
    history: RwLock<Vec<String>>,
    reloads: AtomicUsize,
}

impl MemoryLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: RwLock::new(url.into()),
            history: RwLock::new(Vec::new()),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Urls navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.read().clone()
    }

    /// Number of route reloads
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Location for MemoryLocation {
    fn url(&self) -> String {
        self.url.read().clone()
    }

    fn set_url(&self, url: &str) {
        *self.url.write() = url.to_string();
        self.history.write().push(url.to_string());
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// A gateway call, as recorded by [`InMemoryRestGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub entity: String,
    pub action: Option<String>,
    pub pks: Vec<String>,
}

type LinkKey = (String, String, String);

/// In-process backend answering every gateway call
///
/// Beans are stored per entity under their serialized primary key.
/// Created beans missing a key get the next integer of a shared sequence.
/// Associations made through [`RestGateway::link`] are kept per link and
/// source key. Every call is recorded.
///
/// Useful for testing and development.
#[derive(Clone)]
pub struct InMemoryRestGateway {
    model: Arc<EntityModel>,
    beans: Arc<RwLock<HashMap<String, IndexMap<String, Value>>>>,
    links: Arc<RwLock<HashMap<LinkKey, Vec<String>>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    sequence: Arc<AtomicI64>,
}

impl InMemoryRestGateway {
    pub fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            beans: Arc::new(RwLock::new(HashMap::new())),
            links: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            sequence: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Store a bean, assigning missing key fields; returns its serialized key
    pub fn insert(&self, entity: &str, mut bean: Value) -> NavResult<String> {
        let definition = self.model.entity(entity)?;
        if let Some(fields) = bean.as_object_mut() {
            for field in definition.pk() {
                let missing = fields.get(field).is_none_or(Value::is_null);
                if missing {
                    let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                    fields.insert(field.clone(), json!(next));
                }
            }
        }
        let pk = definition
            .string_primary_key_of(&bean)
            .ok_or_else(|| RestError::Decode {
                message: format!("bean of {} has no primary key", entity),
            })?;
        self.beans
            .write()
            .entry(entity.to_string())
            .or_default()
            .insert(pk.clone(), bean);
        Ok(pk)
    }

    pub fn get(&self, entity: &str, pk: &str) -> Option<Value> {
        self.beans
            .read()
            .get(entity)
            .and_then(|beans| beans.get(pk))
            .cloned()
    }

    /// Every bean of an entity, in insertion order
    pub fn beans(&self, entity: &str) -> Vec<Value> {
        self.beans
            .read()
            .get(entity)
            .map(|beans| beans.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys associated with `pk` through a link of `entity`
    pub fn linked(&self, entity: &str, link: &str, pk: &str) -> Vec<String> {
        self.links
            .read()
            .get(&(entity.to_string(), link.to_string(), pk.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }

    /// Number of recorded calls of a gateway method
    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.read().len()
    }

    fn record(&self, method: &'static str, entity: &str, action: Option<&str>, pks: &[String]) {
        tracing::debug!(method, entity, action, "in-memory gateway call");
        self.calls.write().push(RecordedCall {
            method,
            entity: entity.to_string(),
            action: action.map(String::from),
            pks: pks.to_vec(),
        });
    }

    fn find(&self, entity: &str, pk: &str) -> NavResult<Value> {
        self.get(entity, pk).ok_or_else(|| {
            RestError::NotFound {
                entity: entity.to_string(),
                id: pk.to_string(),
            }
            .into()
        })
    }

    fn linked_beans(&self, key: &LinkKey, entity: &str) -> Vec<Value> {
        let keys = self.links.read().get(key).cloned().unwrap_or_default();
        keys.iter().filter_map(|pk| self.get(entity, pk)).collect()
    }

    /// Store `bean` under `pk`, merging over the stored fields
    fn merge(&self, entity: &str, pk: &str, bean: &Value) -> NavResult<Value> {
        let mut beans = self.beans.write();
        let stored = beans
            .get_mut(entity)
            .and_then(|beans| beans.get_mut(pk))
            .ok_or_else(|| RestError::NotFound {
                entity: entity.to_string(),
                id: pk.to_string(),
            })?;
        if let (Some(target), Some(changes)) = (stored.as_object_mut(), bean.as_object()) {
            for (field, value) in changes {
                target.insert(field.clone(), value.clone());
            }
        }
        Ok(stored.clone())
    }
}

fn with_primary_key(mut bean: Value, pk: &str) -> Value {
    if let Some(fields) = bean.as_object_mut() {
        fields.insert("primaryKey".to_string(), json!(pk));
    }
    bean
}

fn page(results: Vec<Value>, params: Option<&QueryParams>) -> Value {
    let total = results.len() as u64;
    let first = params.and_then(|p| p.first).unwrap_or(0);
    let max = params.and_then(|p| p.max_results).unwrap_or(usize::MAX);
    let mut list = ListResult::new(results.into_iter().skip(first).take(max).collect());
    list.result_set_count = total;
    serde_json::to_value(list).unwrap_or(Value::Null)
}

fn matches(bean: &Value, criteria: Option<&Value>) -> bool {
    let Some(Value::Object(criteria)) = criteria else {
        return true;
    };
    criteria
        .iter()
        .filter(|(_, expected)| !expected.is_null())
        .all(|(field, expected)| bean.get(field) == Some(expected))
}

#[async_trait]
impl RestGateway for InMemoryRestGateway {
    async fn create(&self, action: &Action, bean: Option<&Value>) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("create", entity, Some(&action.name().front), &[]);
        let bean = bean.cloned().unwrap_or_else(|| json!({}));
        let pk = self.insert(entity, bean)?;
        let stored = self.find(entity, &pk)?;
        Ok(RestResponse::ok(with_primary_key(stored, &pk)))
    }

    async fn save(
        &self,
        id: &str,
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("save", entity, Some(&action.name().front), &[id.to_string()]);
        let saved = match bean {
            Some(bean) => self.merge(entity, id, bean)?,
            None => self.find(entity, id)?,
        };
        Ok(RestResponse::ok(with_primary_key(saved, id)))
    }

    async fn multiple_save(
        &self,
        pks: &[String],
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("multiple_save", entity, Some(&action.name().front), pks);
        if let Some(bean) = bean {
            let definition = self.model.entity(entity)?;
            let mut changes = bean.clone();
            if let Some(fields) = changes.as_object_mut() {
                for field in definition.pk() {
                    fields.remove(field);
                }
            }
            for pk in pks {
                self.merge(entity, pk, &changes)?;
            }
        }
        Ok(RestResponse::ok(json!({ "keys": pks })))
    }

    async fn entity(&self, target: ActionTarget<'_>, id: &str) -> NavResult<RestResponse> {
        self.record("entity", target.entity(), Some(target.action()), &[id.to_string()]);
        self.find(target.entity(), id).map(RestResponse::ok)
    }

    async fn multiple_entity(&self, pks: &[String], action: &Action) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("multiple_entity", entity, Some(&action.name().front), pks);
        let beans = pks
            .iter()
            .map(|pk| self.find(entity, pk))
            .collect::<NavResult<Vec<_>>>()?;
        Ok(RestResponse::ok(Value::Array(beans)))
    }

    async fn delete(
        &self,
        id: &str,
        action: &Action,
        _bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("delete", entity, Some(&action.name().front), &[id.to_string()]);
        let removed = self
            .beans
            .write()
            .get_mut(entity.as_str())
            .and_then(|beans| beans.shift_remove(id));
        match removed {
            Some(_) => Ok(RestResponse::ok(Value::Null)),
            None => Err(RestError::NotFound {
                entity: entity.clone(),
                id: id.to_string(),
            }
            .into()),
        }
    }

    async fn delete_multiple(
        &self,
        pks: &[String],
        action: &Action,
        _bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("delete_multiple", entity, Some(&action.name().front), pks);
        if let Some(beans) = self.beans.write().get_mut(entity.as_str()) {
            for pk in pks {
                beans.shift_remove(pk);
            }
        }
        Ok(RestResponse::ok(Value::Null))
    }

    async fn list(
        &self,
        action: &Action,
        bean: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("list", entity, Some(&action.name().front), &[]);
        let results = self
            .beans(entity)
            .into_iter()
            .filter(|candidate| matches(candidate, bean))
            .collect();
        Ok(RestResponse::ok(page(results, params)))
    }

    async fn query(
        &self,
        entity: &str,
        query: &str,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse> {
        self.record("query", entity, Some(query), &[]);
        Ok(RestResponse::ok(page(self.beans(entity), params)))
    }

    async fn list_link(
        &self,
        action: &Action,
        query: &str,
        link: &Link,
        pk: &str,
        params: Option<&QueryParams>,
        entity: Option<&str>,
    ) -> NavResult<RestResponse> {
        let queried = entity.unwrap_or(link.dst_entity());
        self.record("list_link", queried, Some(&action.name().front), &[pk.to_string()]);
        tracing::trace!(query, "listing linked beans");
        let key = (
            link.src_entity().front.clone(),
            link.name().front.clone(),
            pk.to_string(),
        );
        Ok(RestResponse::ok(page(self.linked_beans(&key, queried), params)))
    }

    async fn back_ref(
        &self,
        entity: &str,
        id: &str,
        action_back: &str,
        link_back: &str,
        _action_entity_back: &str,
    ) -> NavResult<RestResponse> {
        self.record("back_ref", entity, Some(action_back), &[id.to_string()]);
        let definition = self.model.entity(entity)?;
        let Some(link) = definition.links().find(|link| link.name().back == link_back) else {
            return Ok(RestResponse::ok(page(Vec::new(), None)));
        };
        let key = (
            entity.to_string(),
            link.name().front.clone(),
            id.to_string(),
        );
        Ok(RestResponse::ok(page(
            self.linked_beans(&key, link.dst_entity()),
            None,
        )))
    }

    async fn link(
        &self,
        action: &Action,
        pks: &[String],
        link: &Link,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let src = &link.src_entity().front;
        self.record("link", src, Some(&action.name().front), pks);
        let parent = bean
            .and_then(|bean| {
                self.model
                    .entity(src)
                    .ok()
                    .and_then(|entity| entity.string_primary_key_of(bean))
            })
            .ok_or_else(|| RestError::Status {
                status: 400,
                url: format!("{}/action/{}/{}", src, action.name().front, link.name().front),
            })?;
        let mut links = self.links.write();
        let linked = links
            .entry((src.clone(), link.name().front.clone(), parent))
            .or_default();
        if action.is_delete() {
            linked.retain(|pk| !pks.contains(pk));
        } else {
            for pk in pks {
                if !linked.contains(pk) {
                    linked.push(pk.clone());
                }
            }
        }
        Ok(RestResponse::ok(json!({ "keys": pks })))
    }

    async fn get_link(&self, action: &Action, pk: &str, link: &Link) -> NavResult<RestResponse> {
        let src = &link.src_entity().front;
        self.record("get_link", src, Some(&action.name().front), &[pk.to_string()]);
        let key = (src.clone(), link.name().front.clone(), pk.to_string());
        Ok(RestResponse::ok(page(
            self.linked_beans(&key, link.dst_entity()),
            None,
        )))
    }

    async fn no_input(&self, action: &Action) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("no_input", entity, Some(&action.name().front), &[]);
        Ok(RestResponse::ok(page(self.beans(entity), None)))
    }

    async fn no_input_update(&self, action: &Action) -> NavResult<RestResponse> {
        let entity = &action.entity().front;
        self.record("no_input_update", entity, Some(&action.name().front), &[]);
        Ok(RestResponse::ok(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Arc<EntityModel> {
        let model = EntityModel::new();
        for definition in [
            json!({
                "name": {"front": "balise", "back": "BALISE"},
                "pk": ["id"],
                "pkMap": {"id": "I"},
                "actions": [
                    {"name": {"front": "create", "back": "CREATE"}, "persistence": "insert", "input": "none"},
                    {"name": {"front": "list", "back": "LIST"}, "input": "query"},
                    {"name": {"front": "attach", "back": "ATTACH"}, "process": "link",
                     "persistence": "insert", "input": "object-multiple"},
                    {"name": {"front": "detach", "back": "DETACH"}, "process": "link",
                     "persistence": "delete", "input": "object-multiple"}
                ],
                "links": [{"name": {"front": "photos", "back": "PHOTOS"}, "entity": "photo"}]
            }),
            json!({
                "name": {"front": "photo", "back": "PHOTO"},
                "pk": ["id"],
                "pkMap": {"id": "I"}
            }),
        ] {
            model.add_entity(serde_json::from_value(definition).unwrap());
        }
        Arc::new(model)
    }

    #[test]
    fn test_session_storage() {
        let storage = MemorySessionStorage::new();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
        storage.remove("a").unwrap();
        assert!(storage.get("a").unwrap().is_none());
        storage.set("b", "2").unwrap();
        storage.clear().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_location_search() {
        let location = MemoryLocation::new("/balise/display/id:::I1?c=3");
        assert_eq!(location.path(), "/balise/display/id:::I1");
        assert_eq!(location.search("c").as_deref(), Some("3"));
        assert!(location.search("pks").is_none());
        location.set_url("/");
        location.reload();
        assert_eq!(location.history(), vec!["/"]);
        assert_eq!(location.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_create_assigns_key() {
        let model = model();
        let gateway = InMemoryRestGateway::new(model.clone());
        let create = model.action("balise", "create").unwrap();
        let response = gateway
            .create(&create, Some(&json!({"name": "North"})))
            .await
            .unwrap();
        assert_eq!(response.data["primaryKey"], "id:::I1");
        assert_eq!(gateway.get("balise", "id:::I1").unwrap()["name"], "North");
        assert_eq!(gateway.call_count("create"), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let model = model();
        let gateway = InMemoryRestGateway::new(model.clone());
        for name in ["a", "b", "a"] {
            gateway.insert("balise", json!({"name": name})).unwrap();
        }
        let list = model.action("balise", "list").unwrap();
        let response = gateway
            .list(&list, Some(&json!({"name": "a"})), None)
            .await
            .unwrap();
        assert_eq!(response.list().unwrap().result_set_count, 2);

        let params = QueryParams::default().with_page(2, 2);
        let response = gateway.list(&list, None, Some(&params)).await.unwrap();
        let page = response.list().unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.result_set_count, 3);
    }

    #[tokio::test]
    async fn test_link_attach_and_detach() {
        let model = model();
        let gateway = InMemoryRestGateway::new(model.clone());
        let parent = gateway.insert("balise", json!({"name": "North"})).unwrap();
        let photo = gateway.insert("photo", json!({"file": "n.png"})).unwrap();
        let link = model.entity("balise").unwrap().link("photos").unwrap();
        let bean = gateway.get("balise", &parent).unwrap();

        let attach = model.action("balise", "attach").unwrap();
        gateway
            .link(&attach, &[photo.clone()], &link, Some(&bean))
            .await
            .unwrap();
        assert_eq!(gateway.linked("balise", "photos", &parent), vec![photo.clone()]);
        let listed = gateway
            .list_link(&attach, "photo", &link, &parent, None, None)
            .await
            .unwrap();
        assert_eq!(listed.list().unwrap().results[0]["file"], "n.png");

        let detach = model.action("balise", "detach").unwrap();
        gateway
            .link(&detach, &[photo], &link, Some(&bean))
            .await
            .unwrap();
        assert!(gateway.linked("balise", "photos", &parent).is_empty());

        let err = gateway.link(&attach, &[], &link, None).await.unwrap_err();
        assert_eq!(err.error_code(), "REST_STATUS");
    }

    #[tokio::test]
    async fn test_missing_bean_is_not_found() {
        let model = model();
        let gateway = InMemoryRestGateway::new(model.clone());
        let list = model.action("balise", "list").unwrap();
        let err = gateway
            .entity(ActionTarget::from(list.as_ref()), "id:::I9")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "REST_NOT_FOUND");
    }
}
