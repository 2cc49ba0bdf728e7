//! Loading the data of the current screen

use crate::context::NavigationStore;
use crate::core::action::Action;
use crate::core::error::{ActionError, NavResult, StackError};
use crate::core::link::Link;
use crate::core::query::QueryParams;
use crate::core::service::{ActionTarget, RestGateway};
use serde_json::Value;
use std::sync::Arc;

/// Fetches what the current context shows
#[derive(Clone)]
pub struct LoadService {
    store: Arc<NavigationStore>,
    rest: Arc<dyn RestGateway>,
}

impl LoadService {
    pub fn new(store: Arc<NavigationStore>, rest: Arc<dyn RestGateway>) -> Self {
        Self { store, rest }
    }

    /// Data of the current context for `action`
    ///
    /// Data already held by the context is returned without any call.
    /// Otherwise the fetch matches the input of the action: the entity query
    /// for link screens, one bean by key, several beans by key, the search
    /// results or the no-input call. The result is stored in the context
    /// and handed to its `after_back_load` callback, unless the user left
    /// the context meanwhile.
    pub async fn load_data(
        &self,
        action: &Action,
        pks: &[String],
        params: Option<&QueryParams>,
    ) -> NavResult<Value> {
        let current = self
            .store
            .get_current(false)
            .ok_or(StackError::NoCurrentContext)?;
        if let Some(data) = current.data(false) {
            return Ok(data);
        }
        let ticket = self.store.ticket();
        let entity = &action.entity().front;
        tracing::debug!(
            entity = %entity,
            action = %action.name().front,
            pks = ?pks,
            "loading context data"
        );

        let data = if action.has_link_process() {
            let response = self.rest.query(entity, entity, None).await?;
            Value::Array(response.list()?.results)
        } else if action.has_single_input() {
            let Some(pk) = pks.first() else {
                return Err(ActionError::InvalidOperation {
                    action: action.name().front.clone(),
                    message: "cannot load without a key".to_string(),
                }
                .into());
            };
            self.rest.entity(ActionTarget::from(action), pk).await?.data
        } else if action.has_multiple_input() {
            self.rest.multiple_entity(pks, action).await?.data
        } else if action.has_query_input() {
            self.rest.list(action, None, params).await?.data
        } else {
            self.rest.no_input(action).await?.data
        };

        if !self.store.is_live(ticket) {
            tracing::debug!(entity = %entity, "context left before its data arrived");
            return Ok(data);
        }
        current.set_data(Some(data.clone()));
        if let Some(after_back_load) = current.take_after_back_load() {
            after_back_load(&data);
        }
        Ok(data)
    }

    /// Bean referenced by `bean` through `link`, shared within the screen
    ///
    /// Components of one screen asking for the same linked bean share a
    /// single backend call. `None` when a foreign-key field is unset.
    pub async fn load_linked(&self, link: &Link, bean: &Value) -> NavResult<Option<Value>> {
        let Some(pk) = link.string_pk_link_entity(bean, self.store.model())? else {
            return Ok(None);
        };
        let context = self.store.require_current()?;
        let action = context.action();
        let entity = link.dst_entity().to_string();
        let action_back = action.name().back.clone();
        let action_entity_back = action.entity().back.clone();
        let link_back = link.name().back.clone();
        let rest = self.rest.clone();

        let key = vec![pk.clone()];
        let fetch = context.cached_or_insert_with(&entity, &key, {
            let entity = entity.clone();
            move || async move {
                rest.back_ref(&entity, &pk, &action_back, &link_back, &action_entity_back)
                    .await
                    .map(|response| response.data)
            }
        });
        fetch.await.map(Some)
    }
}
