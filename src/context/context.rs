//! A navigation frame
//!
//! A [`Context`] binds the action a screen runs to the keys it runs on. It
//! also carries everything the screen accumulates while it is alive: loaded
//! data, a per-frame fetch cache, component states and one-shot callbacks
//! installed by whoever navigated to it.
//!
//! Contexts form a chain through `previous`. Unlike a plain back-reference,
//! `previous` is an owning `Arc`: the current frame keeps its whole chain
//! alive and the store only holds the current frame. A parent never points
//! at its children, so the chain holds no cycle. [`Context::destroy`] drops
//! the link, which the store does for every frame leaving the chain.

use crate::core::action::Action;
use crate::core::error::NavResult;
use crate::core::link::Link;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Default query parameter carrying the stack position in paths
pub const DEFAULT_CONTEXT_PARAM: &str = "c";

/// Characters `encodeURI` leaves alone besides ASCII alphanumerics
const URI_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// A multi-step run of one action over several keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Every key of the run
    pub pks: Vec<String>,
    /// Keys already executed, skipped ones excluded
    #[serde(rename = "executedPks", default)]
    pub executed_pks: Vec<String>,
    /// Index of the current step
    #[serde(default)]
    pub id: usize,
}

impl Flow {
    pub fn new(pks: Vec<String>) -> Self {
        Self {
            pks,
            executed_pks: Vec::new(),
            id: 0,
        }
    }
}

/// Link or query a link-process action runs through
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextOptions {
    pub link: Option<Arc<Link>>,
    pub query: Option<String>,
}

impl ContextOptions {
    pub fn with_link(link: Arc<Link>) -> Self {
        Self {
            link: Some(link),
            query: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.link.is_none() && self.query.is_none()
    }
}

/// Shared in-flight fetch stored in a context cache
pub type SharedFetch = Shared<BoxFuture<'static, NavResult<Value>>>;

/// Future resolving to the context to navigate to after an execution
pub type NextContextFuture = BoxFuture<'static, NavResult<Option<Arc<Context>>>>;

/// Everything an execute override gets to decide what to run
pub struct ExecuteRequest {
    pub action: Arc<Action>,
    pub context: Arc<Context>,
    pub pks: Vec<String>,
    pub current_action: Arc<Action>,
    pub options: Option<ContextOptions>,
    /// The strategy the navigator would have run; lazy until awaited
    pub default: NextContextFuture,
}

/// Replacement of the execution strategy of the next action
pub type ExecuteOverride = Box<dyn FnOnce(ExecuteRequest) -> NextContextFuture + Send>;
/// Called with the response data of a successful execution
pub type AfterExecute = Box<dyn FnOnce(&Value) -> Option<Arc<Context>> + Send>;
/// Called with the data loaded for the context
pub type AfterBackLoad = Box<dyn FnOnce(&Value) + Send>;

/// One-shot callbacks installed on a context
///
/// Each callback is taken out of the table when used.
#[derive(Default)]
pub struct ContextFunctions {
    pub execute: Option<ExecuteOverride>,
    pub after_execute: Option<AfterExecute>,
    pub after_back_load: Option<AfterBackLoad>,
}

impl ContextFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ExecuteRequest) -> NextContextFuture + Send + 'static,
    {
        self.execute = Some(Box::new(f));
        self
    }

    pub fn after_execute<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Option<Arc<Context>> + Send + 'static,
    {
        self.after_execute = Some(Box::new(f));
        self
    }

    pub fn after_back_load<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.after_back_load = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.execute.is_none() && self.after_execute.is_none() && self.after_back_load.is_none()
    }
}

impl fmt::Debug for ContextFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFunctions")
            .field("execute", &self.execute.is_some())
            .field("after_execute", &self.after_execute.is_some())
            .field("after_back_load", &self.after_back_load.is_some())
            .finish()
    }
}

/// Saved state of a UI component
pub type ComponentStateBlob = Map<String, Value>;

#[derive(Debug, Default)]
struct Data {
    origin: Option<Value>,
    dirty: Option<Value>,
}

#[derive(Debug, Default)]
struct Components {
    ids: HashMap<String, usize>,
    states: HashMap<String, ComponentStateBlob>,
}

struct Inner {
    action: Arc<Action>,
    pks: Vec<String>,
    id_context: usize,
    previous: Option<Arc<Context>>,
    flow: Option<Flow>,
    options: ContextOptions,
    selected_rows: Vec<Value>,
    title: String,
    title_tooltip: String,
    custom_path: String,
    data: Data,
    cache: HashMap<String, HashMap<String, SharedFetch>>,
    components: Components,
    destroyed: bool,
}

/// One frame of the navigation stack
pub struct Context {
    uid: Uuid,
    inner: RwLock<Inner>,
    functions: Mutex<ContextFunctions>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Context")
            .field("uid", &self.uid)
            .field("id_context", &inner.id_context)
            .field("entity", &inner.action.entity().front)
            .field("action", &inner.action.name().front)
            .field("pks", &inner.pks)
            .field("flow", &inner.flow)
            .field("previous", &inner.previous.as_ref().map(|p| p.id_context()))
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

impl Context {
    pub fn new(
        action: Arc<Action>,
        pks: Vec<String>,
        id_context: usize,
        previous: Option<Arc<Context>>,
        flow: Option<Flow>,
        options: Option<ContextOptions>,
    ) -> Arc<Self> {
        Arc::new(Self {
            uid: Uuid::new_v4(),
            inner: RwLock::new(Inner {
                action,
                pks,
                id_context,
                previous,
                flow,
                options: options.unwrap_or_default(),
                selected_rows: Vec::new(),
                title: String::new(),
                title_tooltip: String::new(),
                custom_path: String::new(),
                data: Data::default(),
                cache: HashMap::new(),
                components: Components::default(),
                destroyed: false,
            }),
            functions: Mutex::new(ContextFunctions::default()),
        })
    }

    /// Identity of this frame, distinct for every context ever built
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn action(&self) -> Arc<Action> {
        self.inner.read().action.clone()
    }

    pub fn set_action(&self, action: Arc<Action>) {
        self.inner.write().action = action;
    }

    pub fn pks(&self) -> Vec<String> {
        self.inner.read().pks.clone()
    }

    /// Replace the first key, e.g. with the key the backend assigned
    pub fn set_first_pk(&self, pk: String) {
        let mut inner = self.inner.write();
        match inner.pks.first_mut() {
            Some(first) => *first = pk,
            None => inner.pks.push(pk),
        }
    }

    pub fn id_context(&self) -> usize {
        self.inner.read().id_context
    }

    pub(crate) fn set_id_context(&self, id_context: usize) {
        self.inner.write().id_context = id_context;
    }

    pub fn previous(&self) -> Option<Arc<Context>> {
        self.inner.read().previous.clone()
    }

    pub(crate) fn set_previous(&self, previous: Option<Arc<Context>>) {
        self.inner.write().previous = previous;
    }

    pub fn flow(&self) -> Option<Flow> {
        self.inner.read().flow.clone()
    }

    pub fn options(&self) -> ContextOptions {
        self.inner.read().options.clone()
    }

    pub fn selected_rows(&self) -> Vec<Value> {
        self.inner.read().selected_rows.clone()
    }

    pub fn set_selected_rows(&self, rows: Vec<Value>) {
        self.inner.write().selected_rows = rows;
    }

    pub fn title(&self) -> String {
        self.inner.read().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.write().title = title.into();
    }

    pub fn title_tooltip(&self) -> String {
        self.inner.read().title_tooltip.clone()
    }

    pub fn set_title_tooltip(&self, tooltip: impl Into<String>) {
        self.inner.write().title_tooltip = tooltip.into();
    }

    pub fn custom_path(&self) -> String {
        self.inner.read().custom_path.clone()
    }

    /// Route this context to a custom page instead of its action path
    pub fn set_custom_path(&self, path: impl Into<String>) {
        self.inner.write().custom_path = path.into();
    }

    /// Whether this frame runs one step of a flow
    pub fn is_in_flow(&self) -> bool {
        self.inner.read().flow.is_some()
    }

    /// Context of the next step of the flow
    ///
    /// The current key is recorded as executed unless `skip_current`.
    /// Returns `None` outside a flow and after its last step. Options are not
    /// carried over.
    pub fn next_step_context(&self, skip_current: bool) -> Option<Arc<Context>> {
        let inner = self.inner.read();
        let flow = inner.flow.as_ref()?;
        let mut executed_pks = flow.executed_pks.clone();
        if !skip_current {
            if let Some(current) = flow.pks.get(flow.id) {
                executed_pks.push(current.clone());
            }
        }
        let next = Flow {
            pks: flow.pks.clone(),
            id: flow.id + 1,
            executed_pks,
        };
        let pk = next.pks.get(next.id)?.clone();
        Some(Context::new(
            inner.action.clone(),
            vec![pk],
            inner.id_context,
            inner.previous.clone(),
            Some(next),
            None,
        ))
    }

    /// Whether this frame runs `action` on exactly `pks`
    pub fn is_same(&self, action: &Action, pks: &[String]) -> bool {
        let inner = self.inner.read();
        *inner.action == *action && inner.pks == pks
    }

    /// Cached fetch of an entity instance in this frame
    pub fn get_cache(&self, entity: &str, pks: &[String]) -> Option<SharedFetch> {
        self.inner
            .read()
            .cache
            .get(entity)
            .and_then(|entries| entries.get(&pks.join(",")))
            .cloned()
    }

    /// Cache a fetch so sibling components share it
    pub fn set_cache(&self, entity: &str, pks: &[String], fetch: SharedFetch) {
        self.inner
            .write()
            .cache
            .entry(entity.to_string())
            .or_default()
            .insert(pks.join(","), fetch);
    }

    /// Cache an already known value
    pub fn set_cache_value(&self, entity: &str, pks: &[String], value: Value) {
        let fetch = futures::future::ready(Ok(value)).boxed().shared();
        self.set_cache(entity, pks, fetch);
    }

    /// Cached fetch, or start and cache `fetch` when absent
    pub fn cached_or_insert_with<F, Fut>(&self, entity: &str, pks: &[String], fetch: F) -> SharedFetch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = NavResult<Value>> + Send + 'static,
    {
        let mut inner = self.inner.write();
        inner
            .cache
            .entry(entity.to_string())
            .or_default()
            .entry(pks.join(","))
            .or_insert_with(|| fetch().boxed().shared())
            .clone()
    }

    pub fn clear_cache(&self) {
        self.inner.write().cache.clear();
    }

    /// Route of this context, `param` carrying the stack position
    ///
    /// `/{entity}/{action}[/{pk}][/{partner entity}/{link}][?pks=..][?{param}={id}]`,
    /// URI-encoded. A custom path takes precedence.
    pub fn path(&self, param: &str) -> String {
        let inner = self.inner.read();
        if !inner.custom_path.is_empty() {
            return encode_uri(&inner.custom_path);
        }
        let action = &inner.action;
        let mut path = format!("/{}/{}", action.entity().front, action.name().front);
        if action.has_single_input() {
            path.push('/');
            if let Some(pk) = inner.pks.first() {
                path.push_str(pk);
            }
        }
        if action.has_link_process() {
            if let Some(link) = &inner.options.link {
                let partner = if action.entity().front == link.dst_entity() {
                    link.src_entity().front.as_str()
                } else {
                    link.dst_entity()
                };
                path.push('/');
                path.push_str(partner);
                path.push('/');
                path.push_str(&link.name().front);
            }
        }
        let mut has_query = false;
        if action.has_multiple_input() {
            path.push_str("?pks=");
            path.push_str(&inner.pks.join("&pks="));
            has_query = true;
        }
        path.push(if has_query { '&' } else { '?' });
        path.push_str(param);
        path.push('=');
        path.push_str(&inner.id_context.to_string());
        encode_uri(&path)
    }

    /// Route of this context with the default stack parameter
    pub fn get_path(&self) -> String {
        self.path(DEFAULT_CONTEXT_PARAM)
    }

    /// Install the one-shot callbacks of this context
    pub fn set_functions(&self, functions: ContextFunctions) {
        *self.functions.lock() = functions;
    }

    pub fn take_execute(&self) -> Option<ExecuteOverride> {
        self.functions.lock().execute.take()
    }

    pub fn take_after_execute(&self) -> Option<AfterExecute> {
        self.functions.lock().after_execute.take()
    }

    pub fn take_after_back_load(&self) -> Option<AfterBackLoad> {
        self.functions.lock().after_back_load.take()
    }

    /// Store loaded data, keeping an untouched copy beside the editable one
    pub fn set_data(&self, data: Option<Value>) {
        let mut inner = self.inner.write();
        inner.data.origin = data.clone();
        inner.data.dirty = data;
    }

    /// Editable data, or the data as loaded when `original`
    pub fn data(&self, original: bool) -> Option<Value> {
        let inner = self.inner.read();
        if original {
            inner.data.origin.clone()
        } else {
            inner.data.dirty.clone()
        }
    }

    /// Edit the data without touching the loaded copy
    pub fn update_data<F>(&self, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut inner = self.inner.write();
        if let Some(dirty) = inner.data.dirty.as_mut() {
            f(dirty);
        }
    }

    pub fn has_data(&self) -> bool {
        self.inner.read().data.dirty.is_some()
    }

    /// Save a component state, merging into the state already saved
    pub fn save_component_state(&self, component_id: &str, state: ComponentStateBlob) {
        if component_id.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        inner
            .components
            .states
            .entry(component_id.to_string())
            .or_default()
            .extend(state);
    }

    /// Saved state of a component, empty when unknown
    pub fn get_component_state(&self, component_id: &str) -> ComponentStateBlob {
        self.inner
            .read()
            .components
            .states
            .get(component_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Unique identifier for a component named `name` in this frame
    ///
    /// `name` the first time, then `name-2`, `name-3`, ...
    pub fn get_component_id(&self, name: &str) -> String {
        let mut inner = self.inner.write();
        let count = inner.components.ids.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            name.to_string()
        } else {
            format!("{}-{}", name, count)
        }
    }

    pub fn reset_component_ids(&self) {
        self.inner.write().components.ids.clear();
    }

    /// Release what this frame holds
    ///
    /// Async work still referencing the frame sees it destroyed and drops
    /// its result.
    pub fn destroy(&self) {
        let mut inner = self.inner.write();
        inner.destroyed = true;
        inner.previous = None;
        inner.selected_rows.clear();
        inner.components = Components::default();
        inner.cache.clear();
        drop(inner);
        *self.functions.lock() = ContextFunctions::default();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.read().destroyed
    }

    /// This frame and its ancestors, oldest first
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<Context>> {
        let mut chain = vec![self.clone()];
        let mut current = self.previous();
        while let Some(context) = current {
            current = context.previous();
            chain.push(context);
        }
        chain.reverse();
        chain
    }
}

/// Percent-encode a path the way `encodeURI` does, segments kept verbatim
fn encode_uri(raw: &str) -> String {
    utf8_percent_encode(raw, URI_RESERVED).to_string()
}
