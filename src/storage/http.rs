//! REST gateway over HTTP
//!
//! Maps every gateway call onto the backend routes:
//!
//! | call              | method | route                                              |
//! |-------------------|--------|----------------------------------------------------|
//! | `create`          | POST   | `{entity}/action/{action}`                         |
//! | `save`            | PUT    | `{entity}/id/{id}/action/{action}`                 |
//! | `multiple_save`   | PUT    | `{entity}/action/{action}` with `{bean, keys}`     |
//! | `entity`          | GET    | `{entity}/id/{id}/action/{action}`                 |
//! | `multiple_entity` | GET    | `{entity}/action/{action}?id=..`                   |
//! | `delete`          | POST   | `{entity}/id/{id}/action/{action}`                 |
//! | `delete_multiple` | POST   | `{entity}/action/{action}?id=..`                   |
//! | `list`            | POST   | `{entity}/action/{action}` with the criteria       |
//! | `query`           | GET    | `{entity}/query/{query}`                           |
//! | `list_link`       | GET    | `{entity}/query/{query}?link-name=..&link-key=..`  |
//! | `back_ref`        | GET    | `{entity}/id/{id}/back-ref/{link}`                 |
//! | `link`            | PUT    | `{src entity}/action/{action}/{link}`              |
//! | `get_link`        | GET    | `{entity}/id/{id}/action/{action}/{link}`          |
//! | `no_input`        | GET    | `{entity}/action/{action}`                         |
//! | `no_input_update` | PUT    | `{entity}/action/{action}`                         |
//!
//! Writing routes get `/sub-action/{code}` appended when the action has a
//! selected sub-action. Reads carry an `r-r` timestamp so that no
//! intermediate cache answers them.

use crate::core::action::Action;
use crate::core::auth::SessionSecurity;
use crate::core::error::{NavResult, RestError};
use crate::core::link::Link;
use crate::core::model::EntityModel;
use crate::core::query::QueryParams;
use crate::core::service::{ActionTarget, RestGateway, RestResponse};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

type Params = Vec<(String, String)>;

/// Gateway sending every call to an HTTP backend
#[derive(Clone)]
pub struct HttpRestGateway {
    client: Client,
    backend: Url,
    model: Arc<EntityModel>,
    session: Option<Arc<SessionSecurity>>,
    in_flight: Arc<AtomicUsize>,
}

impl HttpRestGateway {
    /// Gateway for the backend at `backend_url`
    ///
    /// `model` resolves the entities a link goes through.
    pub fn new(backend_url: &str, model: Arc<EntityModel>) -> NavResult<Self> {
        let backend = Url::parse(backend_url).map_err(|e| RestError::Transport {
            message: format!("invalid backend url {}: {}", backend_url, e),
        })?;
        if backend.cannot_be_a_base() {
            return Err(RestError::Transport {
                message: format!("backend url {} cannot be a base", backend_url),
            }
            .into());
        }
        Ok(Self {
            client: Client::new(),
            backend,
            model,
            session: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Authenticate calls with the access token of the session
    pub fn with_session(mut self, session: Arc<SessionSecurity>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Whether a call is in progress
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.backend.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Route of a writing call, with the selected sub-action
    fn action_url(&self, segments: &[&str], action: &Action) -> Url {
        let mut all = segments.to_vec();
        all.extend(["action", action.name().front.as_str()]);
        let sub_action = action.selected_sub_action();
        if let Some(sub_action) = &sub_action {
            all.extend(["sub-action", sub_action.code.front.as_str()]);
        }
        self.url(&all)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match self.session.as_ref().and_then(|session| session.token()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> NavResult<RestResponse> {
        let request = request.build().map_err(transport)?;
        let url = request.url().to_string();
        tracing::debug!(method = %request.method(), url = %url, "backend call");

        let in_flight = InFlight::start(&self.in_flight);
        let response = self.client.execute(request).await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await;
        drop(in_flight);

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), url = %url, "backend call failed");
            return Err(RestError::Status {
                status: status.as_u16(),
                url,
            }
            .into());
        }
        let body = body.map_err(transport)?;
        let data = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).map_err(|e| RestError::Decode {
                message: e.to_string(),
            })?
        };
        Ok(RestResponse {
            data,
            status: status.as_u16(),
        })
    }

    fn back_name(&self, entity: &str) -> NavResult<String> {
        Ok(self.model.entity(entity)?.name().back.clone())
    }
}

fn transport(err: reqwest::Error) -> crate::core::error::NavError {
    RestError::Transport {
        message: err.to_string(),
    }
    .into()
}

fn cache_buster() -> (String, String) {
    ("r-r".to_string(), chrono::Utc::now().timestamp_millis().to_string())
}

fn ids(pks: &[String]) -> Params {
    pks.iter().map(|pk| ("id".to_string(), pk.clone())).collect()
}

fn query_pairs(params: Option<&QueryParams>) -> Params {
    params.map(QueryParams::to_pairs).unwrap_or_default()
}

/// Counts a call in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RestGateway for HttpRestGateway {
    async fn create(&self, action: &Action, bean: Option<&Value>) -> NavResult<RestResponse> {
        let url = self.action_url(&[&action.entity().front], action);
        self.send(self.request(Method::POST, url).json(&bean))
            .await
    }

    async fn save(
        &self,
        id: &str,
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let url = self.action_url(&[&action.entity().front, "id", id], action);
        self.send(self.request(Method::PUT, url).json(&bean)).await
    }

    async fn multiple_save(
        &self,
        pks: &[String],
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let url = self.action_url(&[&action.entity().front], action);
        let body = json!({ "bean": bean, "keys": pks });
        self.send(self.request(Method::PUT, url).json(&body)).await
    }

    async fn entity(&self, target: ActionTarget<'_>, id: &str) -> NavResult<RestResponse> {
        let url = self.url(&[target.entity(), "id", id, "action", target.action()]);
        self.send(self.request(Method::GET, url).query(&[cache_buster()]))
            .await
    }

    async fn multiple_entity(&self, pks: &[String], action: &Action) -> NavResult<RestResponse> {
        let url = self.url(&[&action.entity().front, "action", &action.name().front]);
        let mut params = ids(pks);
        params.push(cache_buster());
        self.send(self.request(Method::GET, url).query(&params)).await
    }

    async fn delete(
        &self,
        id: &str,
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let url = self.action_url(&[&action.entity().front, "id", id], action);
        self.send(self.request(Method::POST, url).json(&bean)).await
    }

    async fn delete_multiple(
        &self,
        pks: &[String],
        action: &Action,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let url = self.action_url(&[&action.entity().front], action);
        self.send(
            self.request(Method::POST, url)
                .query(&ids(pks))
                .json(&bean),
        )
        .await
    }

    async fn list(
        &self,
        action: &Action,
        bean: Option<&Value>,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse> {
        let url = self.url(&[&action.entity().front, "action", &action.name().front]);
        let criteria = bean.cloned().unwrap_or_else(|| json!({}));
        self.send(
            self.request(Method::POST, url)
                .query(&query_pairs(params))
                .json(&criteria),
        )
        .await
    }

    async fn query(
        &self,
        entity: &str,
        query: &str,
        params: Option<&QueryParams>,
    ) -> NavResult<RestResponse> {
        let url = self.url(&[entity, "query", query]);
        let mut params = query_pairs(params);
        params.push(cache_buster());
        self.send(self.request(Method::GET, url).query(&params)).await
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
        let queried = entity.unwrap_or(link.src_entity().front.as_str());
        let url = self.url(&[queried, "query", query]);
        let mut params = query_pairs(params);
        params.push(cache_buster());
        params.push(("link-name".to_string(), link.name().back.clone()));
        params.push(("link-key".to_string(), pk.to_string()));
        params.push(("action".to_string(), action.name().back.clone()));
        let link_entity = if link.is_associative() {
            Some(self.back_name(link.dst_entity())?)
        } else {
            entity.map(|entity| self.back_name(entity)).transpose()?
        };
        if let Some(link_entity) = link_entity {
            params.push(("link-entity".to_string(), link_entity));
        }
        self.send(self.request(Method::GET, url).query(&params)).await
    }

    async fn back_ref(
        &self,
        entity: &str,
        id: &str,
        action_back: &str,
        link_back: &str,
        action_entity_back: &str,
    ) -> NavResult<RestResponse> {
        let url = self.url(&[entity, "id", id, "back-ref", link_back]);
        let params = [
            ("action".to_string(), action_back.to_string()),
            ("entity-action".to_string(), action_entity_back.to_string()),
            cache_buster(),
        ];
        self.send(self.request(Method::GET, url).query(&params)).await
    }

    async fn link(
        &self,
        action: &Action,
        pks: &[String],
        link: &Link,
        bean: Option<&Value>,
    ) -> NavResult<RestResponse> {
        let junction = link.associative_link(&self.model)?;
        let src = match &junction {
            Some(junction) => junction.src_entity().front.clone(),
            None => link.src_entity().front.clone(),
        };
        let url = self.url(&[&src, "action", &action.name().front, &link.name().front]);
        let body = json!({ "bean": bean, "keys": pks });
        self.send(self.request(Method::PUT, url).json(&body)).await
    }

    async fn get_link(&self, action: &Action, pk: &str, link: &Link) -> NavResult<RestResponse> {
        let url = self.url(&[
            &action.entity().front,
            "id",
            pk,
            "action",
            &action.name().front,
            &link.name().front,
        ]);
        self.send(self.request(Method::GET, url).query(&[cache_buster()]))
            .await
    }

    async fn no_input(&self, action: &Action) -> NavResult<RestResponse> {
        let url = self.url(&[&action.entity().front, "action", &action.name().front]);
        self.send(self.request(Method::GET, url).query(&[cache_buster()]))
            .await
    }

    async fn no_input_update(&self, action: &Action) -> NavResult<RestResponse> {
        let url = self.url(&[&action.entity().front, "action", &action.name().front]);
        self.send(self.request(Method::PUT, url).query(&[cache_buster()]))
            .await
    }
}
