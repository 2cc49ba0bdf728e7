//! The navigation store
//!
//! [`NavigationStore`] owns the current context chain. It is the only place
//! contexts are made current: it builds frames for the navigator, enforces
//! the stack sequencing contract, persists the chain to the session storage
//! after each change and restores it on a cold start.
//!
//! Every change of the current context bumps a generation counter. Async
//! work captures a [`Ticket`] before suspending and checks it with
//! [`NavigationStore::is_live`] before writing its result, so that a result
//! arriving after the user navigated away is dropped.

use crate::config::NavigatorConfig;
use crate::context::context::{Context, ContextOptions, Flow};
use crate::context::snapshot::ContextSnapshot;
use crate::core::action::Action;
use crate::core::auth::SecurityService;
use crate::core::customization::{CustomizationRegistry, HookParams};
use crate::core::error::{NavResult, StackError};
use crate::core::events::{EventBus, NavigationEvent};
use crate::core::hooks::{CONTEXT_COMPONENT, TITLE, TITLE_TOOLTIP};
use crate::core::model::EntityModel;
use crate::storage::{Location, SessionStorage};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Position of the store captured before an async suspension point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    uid: Option<Uuid>,
    generation: u64,
}

/// Owner of the current context chain
pub struct NavigationStore {
    current: RwLock<Option<Arc<Context>>>,
    generation: AtomicU64,
    model: Arc<EntityModel>,
    registry: Arc<CustomizationRegistry>,
    storage: Arc<dyn SessionStorage>,
    location: Arc<dyn Location>,
    security: Arc<dyn SecurityService>,
    events: EventBus,
    config: NavigatorConfig,
}

impl NavigationStore {
    pub fn new(
        model: Arc<EntityModel>,
        registry: Arc<CustomizationRegistry>,
        storage: Arc<dyn SessionStorage>,
        location: Arc<dyn Location>,
        security: Arc<dyn SecurityService>,
        events: EventBus,
        config: NavigatorConfig,
    ) -> Self {
        Self {
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            model,
            registry,
            storage,
            location,
            security,
            events,
            config,
        }
    }

    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    pub fn registry(&self) -> &Arc<CustomizationRegistry> {
        &self.registry
    }

    pub fn security(&self) -> &Arc<dyn SecurityService> {
        &self.security
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Current context, without attempting a restoration
    pub fn current(&self) -> Option<Arc<Context>> {
        self.current.read().clone()
    }

    /// Current context, or the restoration failure when there is none
    pub fn require_current(&self) -> NavResult<Arc<Context>> {
        self.current().ok_or_else(|| StackError::NoCurrentContext.into())
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Capture the current context and generation
    pub fn ticket(&self) -> Ticket {
        let current = self.current.read();
        Ticket {
            uid: current.as_ref().map(|context| context.uid()),
            generation: self.generation(),
        }
    }

    /// Whether nothing replaced or reloaded the current context since `ticket`
    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.ticket() == ticket
    }

    /// Stack position carried by the location, 0 when absent
    pub fn get_id_context(&self) -> usize {
        self.location
            .search(&self.config.context_param)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Current context
    ///
    /// Without a current context and unless `no_redirect`, the chain
    /// persisted in the session is restored. Restoration needs a connected
    /// user and a location other than the root. A restored link screen is
    /// not resumed: its previous screen is shown instead. When nothing can
    /// be restored the stack is cleared and the location moves to the root.
    pub fn get_current(&self, no_redirect: bool) -> Option<Arc<Context>> {
        if let Some(current) = self.current() {
            return Some(current);
        }
        if no_redirect {
            return None;
        }
        match self.restore() {
            Ok(Some(restored)) => {
                tracing::info!(id_context = restored.id_context(), "context chain restored");
                self.events.publish(NavigationEvent::ContextRestored {
                    id_context: restored.id_context(),
                });
                if restored.action().has_link_process() {
                    match restored.previous() {
                        Some(previous) => self.go_to(previous),
                        None => self.go_home(),
                    }
                }
                return self.current();
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "error during context restoration"),
        }
        self.set_context(None);
        tracing::info!("no context found, redirecting to home page");
        self.location.set_url("/");
        None
    }

    fn restore(&self) -> NavResult<Option<Arc<Context>>> {
        if !self.security.is_connected() {
            self.storage.remove(&self.config.session_key)?;
            return Ok(None);
        }
        if self.location.url() == "/" {
            return Ok(None);
        }
        let Some(raw) = self.storage.get(&self.config.session_key)? else {
            return Ok(None);
        };
        let snapshot: ContextSnapshot =
            serde_json::from_str(&raw).map_err(|e| StackError::Restore {
                message: e.to_string(),
            })?;
        let context = snapshot
            .restore(&self.model)
            .map_err(|e| StackError::Restore {
                message: e.to_string(),
            })?;
        self.set_context(Some(context.clone()));
        Ok(Some(context))
    }

    /// Frame of the chain at a stack position
    pub fn get_context(&self, id_context: usize) -> Option<Arc<Context>> {
        let mut frame = self.current();
        while let Some(context) = frame {
            if context.id_context() == id_context {
                return Some(context);
            }
            frame = context.previous();
        }
        None
    }

    /// Context for `action` at the position given by the location
    ///
    /// The frame already at that position is reused when it runs the same
    /// action on the same keys. A fresh root frame only keeps the first key;
    /// deeper frames hang under the current one.
    pub fn init_current(&self, action: Arc<Action>, pks: Vec<String>, begin: bool) -> Arc<Context> {
        let current_id = if begin { 0 } else { self.get_id_context() };
        if let Some(existing) = self.get_context(current_id) {
            if existing.is_same(&action, &pks) {
                return existing;
            }
        }
        let flow = self.get_flow(&action, &pks);
        let (previous, pks_of_context) = if current_id > 0 {
            (self.current(), pks)
        } else {
            (None, pks.into_iter().take(1).collect())
        };
        Context::new(action, pks_of_context, current_id, previous, flow, None)
    }

    /// Swap the top frame for one running `action`, keeping its position
    pub fn replace_current(&self, action: Arc<Action>, pks: Vec<String>) -> NavResult<Arc<Context>> {
        let current = self.require_current()?;
        let flow = self.get_flow(&action, &pks);
        let next_pks = get_next_pk(&action, pks);
        let context = Context::new(
            action,
            next_pks,
            current.id_context(),
            current.previous(),
            flow,
            None,
        );
        self.set_context(Some(context.clone()));
        Ok(context)
    }

    /// Prepare the context following the current one, without pushing it
    ///
    /// Inside a flow, asking for the same action (or for none) yields the
    /// next step of the flow, skipping the current key when an action is
    /// given. `None` when the flow is exhausted or no action is given
    /// outside a flow.
    pub fn create_next(
        &self,
        action: Option<Arc<Action>>,
        pks: Vec<String>,
        options: Option<ContextOptions>,
    ) -> NavResult<Option<Arc<Context>>> {
        let current = self.require_current()?;
        let same_action = action
            .as_ref()
            .is_none_or(|action| **action == *current.action());
        if current.is_in_flow() && same_action {
            return Ok(current.next_step_context(action.is_some()));
        }
        let Some(action) = action else {
            return Ok(None);
        };
        let flow = self.get_flow(&action, &pks);
        let next_pks = get_next_pk(&action, pks);
        Ok(Some(Context::new(
            action,
            next_pks,
            current.id_context() + 1,
            Some(current),
            flow,
            options,
        )))
    }

    /// Make `context` current
    ///
    /// A pushed context must sit right above the current one; a flow
    /// replacement must sit at the current position.
    pub fn set_next(&self, context: Arc<Context>, flow_replace: bool) -> NavResult<()> {
        let current = self.current();
        match &current {
            Some(current) => {
                let expected = if flow_replace {
                    current.id_context()
                } else {
                    current.id_context() + 1
                };
                if context.id_context() != expected {
                    tracing::error!(
                        current = current.id_context(),
                        given = context.id_context(),
                        flow_replace,
                        "context pushed out of sequence"
                    );
                    return Err(StackError::OutOfSequence {
                        current: current.id_context(),
                        given: context.id_context(),
                        flow_replace,
                    }
                    .into());
                }
            }
            None if flow_replace => return Err(StackError::NoCurrentContext.into()),
            None => {}
        }
        if !flow_replace {
            match current {
                Some(current) => context.set_previous(Some(current)),
                None => context.set_id_context(0),
            }
        }
        self.set_context(Some(context));
        Ok(())
    }

    /// Navigate to `context`
    ///
    /// When the location already shows its path the route is reloaded
    /// instead.
    pub fn go_to(&self, context: Arc<Context>) {
        context.reset_component_ids();
        self.set_context(Some(context.clone()));
        let path = context.path(&self.config.context_param);
        let action = context.action();
        tracing::debug!(
            id_context = context.id_context(),
            entity = %action.entity().front,
            action = %action.name().front,
            path = %path,
            "navigating"
        );
        self.events.publish(NavigationEvent::ContextChanged {
            id_context: context.id_context(),
            entity: action.entity().front.clone(),
            action: action.name().front.clone(),
            path: path.clone(),
        });
        if self.location.url() != path {
            self.location.set_url(&path);
        } else {
            self.reload_context(&context);
        }
    }

    /// Empty the stack and navigate to the root
    pub fn go_home(&self) {
        self.set_context(None);
        self.location.set_url("/");
    }

    /// Navigate to the previous context, or to the root from the first one
    pub fn go_to_previous(&self) -> NavResult<()> {
        let current = self.require_current()?;
        match current.previous() {
            Some(previous) => self.go_to(previous),
            None => self.go_home(),
        }
        Ok(())
    }

    /// Move to the next step of the current flow
    ///
    /// Past the last step, goes back to the previous context.
    pub fn go_to_next_in_flow(&self, skip_current: bool) -> NavResult<()> {
        let current = self.require_current()?;
        if !current.is_in_flow() {
            return Err(StackError::NotInFlow.into());
        }
        match current.next_step_context(skip_current) {
            Some(next) => {
                self.set_next(next.clone(), true)?;
                self.go_to(next);
                Ok(())
            }
            None => self.go_to_previous(),
        }
    }

    /// Drop the data of the current context and reload its route
    pub fn reload(&self) -> NavResult<()> {
        let current = self.require_current()?;
        self.reload_context(&current);
        Ok(())
    }

    fn reload_context(&self, context: &Arc<Context>) {
        context.set_data(None);
        context.clear_cache();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.location.reload();
        self.events.publish(NavigationEvent::Reloaded {
            id_context: context.id_context(),
        });
    }

    /// Resolve the title of the screen once it is loaded
    ///
    /// The `title` and `titleTooltip` hooks are asked with the current data;
    /// the context is persisted again when either changed. Returns the
    /// title.
    pub async fn loaded(&self) -> NavResult<String> {
        let current = self.require_current()?;
        let action = current.action();
        let entity = action.entity().front.clone();
        let params = HookParams::new()
            .with("action-name", action.name().front.clone())
            .with("inFlow", current.is_in_flow())
            .with("idContext", current.id_context())
            .with_action(action)
            .with_context(current.clone());
        let bean = current.data(false).unwrap_or(Value::Null);

        let title = self
            .registry
            .invoke(TITLE, &entity, CONTEXT_COMPONENT, bean.clone(), params.clone())
            .await?
            .into_text();
        let tooltip = self
            .registry
            .invoke(TITLE_TOOLTIP, &entity, CONTEXT_COMPONENT, bean, params)
            .await?
            .into_text();

        if current.is_destroyed() {
            tracing::debug!("screen left before its title resolved");
            return Ok(title);
        }
        let mut changed = false;
        if current.title() != title {
            current.set_title(title.clone());
            changed = true;
        }
        if current.title_tooltip() != tooltip {
            current.set_title_tooltip(tooltip);
            changed = true;
        }
        if changed {
            self.save_context();
        }
        Ok(title)
    }

    /// React to the location moving to `path`
    ///
    /// The root and the logout page clear the stack.
    pub fn on_location_change(&self, path: &str) {
        if path == "/" || path == "/logout" {
            self.teardown();
        }
    }

    /// Start of a session: resume the persisted chain when there is one
    pub fn init(&self) -> Option<Arc<Context>> {
        self.get_current(false)
    }

    /// End of a session
    ///
    /// Destroys every frame of the chain and forgets the persisted one. The
    /// location is left where it is, apart from the stack parameter.
    pub fn teardown(&self) {
        tracing::debug!(generation = self.generation(), "navigation store torn down");
        self.set_context(None);
    }

    /// Frames of the current chain, oldest first
    pub fn breadcrumb(&self) -> Vec<Arc<Context>> {
        self.current()
            .map(|current| current.chain())
            .unwrap_or_default()
    }

    /// Replace the current context and persist the chain
    ///
    /// Frames of the old chain that are not part of the new one are
    /// destroyed.
    fn set_context(&self, context: Option<Arc<Context>>) {
        let kept: HashSet<Uuid> = context
            .as_ref()
            .map(|context| context.chain().iter().map(|frame| frame.uid()).collect())
            .unwrap_or_default();
        let old = std::mem::replace(&mut *self.current.write(), context);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(old) = &old {
            for frame in old.chain() {
                if !kept.contains(&frame.uid()) {
                    frame.destroy();
                }
            }
        }
        if old.is_some() && kept.is_empty() {
            self.events.publish(NavigationEvent::ContextCleared);
        }
        self.save_context();
    }

    /// Persist the current chain, or forget it when there is none
    fn save_context(&self) {
        let key = &self.config.session_key;
        let result = match self.current() {
            Some(current) => serde_json::to_string(&current.to_snapshot())
                .map_err(Into::into)
                .and_then(|json| self.storage.set(key, &json)),
            None => {
                let param = &self.config.context_param;
                if self.location.search(param).is_some() {
                    self.location.set_url(&self.location.path());
                }
                self.storage.remove(key)
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "cannot persist the context chain");
        }
    }

    fn get_flow(&self, action: &Action, pks: &[String]) -> Option<Flow> {
        action.has_single_input().then(|| Flow::new(pks.to_vec()))
    }
}

/// Keys a new frame of `action` runs on
///
/// Multiple-input actions keep every key, others only the first.
fn get_next_pk(action: &Action, pks: Vec<String>) -> Vec<String> {
    if action.has_multiple_input() {
        pks
    } else {
        pks.into_iter().take(1).collect()
    }
}
