//! REST gateway contract
//!
//! The navigator never talks HTTP itself: every backend call goes through a
//! [`RestGateway`]. Implementations are agnostic of the navigation state;
//! they only map an action and its arguments onto a backend call.

use crate::core::action::Action;
use crate::core::error::{NavResult, RestError};
use crate::core::link::Link;
use crate::core::query::QueryParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of a gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestResponse {
    pub data: Value,
    pub status: u16,
}

impl RestResponse {
    pub fn ok(data: Value) -> Self {
        Self { data, status: 200 }
    }

    /// Decode the payload of a list endpoint
    pub fn list(&self) -> NavResult<ListResult> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            RestError::Decode {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Payload of list endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(rename = "resultSetCount", default)]
    pub result_set_count: u64,
}

impl ListResult {
    pub fn new(results: Vec<Value>) -> Self {
        let result_set_count = results.len() as u64;
        Self {
            results,
            result_set_count,
        }
    }
}

/// Action addressed by a fetch, either a built action or a pair of names
#[derive(Debug, Clone, Copy)]
pub enum ActionTarget<'a> {
    Action(&'a Action),
    Named { entity: &'a str, action: &'a str },
}

impl ActionTarget<'_> {
    /// Front name of the entity
    pub fn entity(&self) -> &str {
        match self {
            ActionTarget::Action(action) => &action.entity().front,
            ActionTarget::Named { entity, .. } => entity,
        }
    }

    /// Front name of the action
    pub fn action(&self) -> &str {
        match self {
            ActionTarget::Action(action) => &action.name().front,
            ActionTarget::Named { action, .. } => action,
        }
    }
}

impl<'a> From<&'a Action> for ActionTarget<'a> {
    fn from(action: &'a Action) -> Self {
        ActionTarget::Action(action)
    }
}

/// Backend calls issued by the navigator and the load service
///
/// `id` and `pks` are serialized primary keys. Bodies are optional because
/// actions without user interface send none.
#[async_trait]
pub trait RestGateway: Send + Sync {
    /// Create a bean
    async fn create(&self, action: &Action, bean: Option<&Value>) -> NavResult<RestResponse>;

    /// Save an existing bean
    async fn save(&self, id: &str, action: &Action, bean: Option<&Value>)
    -> NavResult<RestResponse>;

    /// Save the same changes on several beans
    async fn multiple_save(
        &self,
        pks: &[String],
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse>;

    /// Fetch one bean through an action
    async fn entity(&self, target: ActionTarget<'_>, id: &str) -> NavResult<RestResponse>;

    /// Fetch several beans through an action
    async fn multiple_entity(&self, pks: &[String], action: &Action) -> NavResult<RestResponse>;

    async fn delete(&self, id: &str, action: &Action, bean: Option<&Value>)
    -> NavResult<RestResponse>;

    async fn delete_multiple(
        &self,
        pks: &[String],
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse>;

    /// Run a query-input action, `bean` holding the search criteria
    async fn list(
        &self,
        action: &Action,
        bean: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse>;

    /// Run a named query of an entity
    async fn query(
        &self,
        entity: &str,
        query: &str,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse>;

    /// Run a query restricted to the beans linked to `pk` through `link`
    ///
    /// `entity` overrides the queried entity (front name), which defaults to
    /// the source entity of the link.
    async fn list_link(
        &self,
        action: &Action,
        query: &str,
        link: &Link,
        pk: &str,
        params: Option<&QueryParams>,
        entity: Option<&str>,
    ) -> NavResult<RestResponse>;

    /// Fetch the beans referencing `id` through a link, by back names
    async fn back_ref(
        &self,
        entity: &str,
        id: &str,
        action_back: &str,
        link_back: &str,
        action_entity_back: &str,
    ) -> NavResult<RestResponse>;

    /// Attach or detach `pks` through a link
    async fn link(
        &self,
        action: &Action,
        pks: &[String],
        link: &Link,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse>;

    /// Fetch the view of a bean used by a link screen
    async fn get_link(&self, action: &Action, pk: &str, link: &Link) -> NavResult<RestResponse>;

    /// Run an action without input
    async fn no_input(&self, action: &Action) -> NavResult<RestResponse>;

    /// Run an updating action without input
    async fn no_input_update(&self, action: &Action) -> NavResult<RestResponse>;
}
