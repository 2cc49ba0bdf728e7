//! The action state machine
//!
//! [`Navigator`] drives an action from the moment the user triggers it to
//! the screen shown afterwards:
//!
//! ```text
//! redirect_to_page_action ─┬─> navigation (push, replace or menu root)
//!                          └─> execute ─> validate-action ─> strategy (REST)
//!                                         ─> after execute ─> next-action
//!                                         ─> next context resolution
//! ```
//!
//! Every REST call of an execution strategy completes before the context it
//! belongs to is touched, so a failed call leaves the stack unchanged. A
//! result arriving after the user navigated elsewhere is dropped.

use crate::context::{
    Context, ContextFunctions, ContextOptions, ExecuteRequest, NavigationStore, Ticket,
};
use crate::core::action::Action;
use crate::core::auth::SecurityService;
use crate::core::customization::HookParams;
use crate::core::error::{ActionError, NavResult};
use crate::core::events::{NavigationEvent, UserMessage};
use crate::core::hooks::{
    ACTION_COMPONENT, CANCEL_ACTION, MENU_ACTION, NEXT_ACTION, OVERRIDE_ACTION, VALIDATE_ACTION,
};
use crate::core::link::Link;
use crate::core::service::{RestGateway, RestResponse};
use crate::navigation::load::LoadService;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

/// Message published when a menu action finds nothing to work on
pub const MENU_ACTION_NO_ELEMENT: &str = "core.menu-action-no-element-error";

/// How an action is carried out once validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Nothing to send, the screen only shows data
    Read,
    Update,
    Create,
    Delete,
}

impl ExecutionStrategy {
    /// Strategy of `action`, `None` when its declaration matches none
    pub fn of(action: &Action) -> Option<Self> {
        if action.has_no_persistence() && !action.has_custom_process() {
            Some(ExecutionStrategy::Read)
        } else if action.is_update() || action.has_custom_process() {
            Some(ExecutionStrategy::Update)
        } else if action.is_create() {
            Some(ExecutionStrategy::Create)
        } else if action.is_delete() {
            Some(ExecutionStrategy::Delete)
        } else {
            None
        }
    }
}

/// Arguments of a redirection
///
/// ```rust,ignore
/// navigator
///     .redirect_to_page_action(display, Redirect::with_pks(vec![pk]))
///     .await?;
/// navigator
///     .redirect_to_page_action(list, Redirect::default().from_menu())
///     .await?;
/// ```
#[derive(Default)]
pub struct Redirect {
    pub pks: Vec<String>,
    pub functions: Option<ContextFunctions>,
    pub options: Option<ContextOptions>,
    /// Started from a menu entry: the stack restarts at the root
    pub from_menu: bool,
    /// Chained by the `next-action` hook: the top frame is replaced
    pub next_action: bool,
}

impl Redirect {
    pub fn with_pks(pks: Vec<String>) -> Self {
        Self {
            pks,
            ..Default::default()
        }
    }

    pub fn from_menu(mut self) -> Self {
        self.from_menu = true;
        self
    }

    pub fn functions(mut self, functions: ContextFunctions) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redirect")
            .field("pks", &self.pks)
            .field("options", &self.options)
            .field("from_menu", &self.from_menu)
            .field("next_action", &self.next_action)
            .finish()
    }
}

/// Everything a strategy needs, owned so the strategy can run lazily
struct Execution {
    action: Arc<Action>,
    context: Arc<Context>,
    pks: Vec<String>,
    current_action: Arc<Action>,
    options: Option<ContextOptions>,
    ticket: Ticket,
}

/// Runs actions against the backend and moves the navigation stack
#[derive(Clone)]
pub struct Navigator {
    store: Arc<NavigationStore>,
    rest: Arc<dyn RestGateway>,
}

impl Navigator {
    pub fn new(store: Arc<NavigationStore>, rest: Arc<dyn RestGateway>) -> Self {
        Self { store, rest }
    }

    pub fn builder() -> crate::navigation::NavigatorBuilder {
        crate::navigation::NavigatorBuilder::new()
    }

    pub fn store(&self) -> &Arc<NavigationStore> {
        &self.store
    }

    pub fn rest(&self) -> &Arc<dyn RestGateway> {
        &self.rest
    }

    /// Load service sharing this navigator's store and gateway
    pub fn loader(&self) -> LoadService {
        LoadService::new(self.store.clone(), self.rest.clone())
    }

    /// Whether `action` may be offered on a screen running `current`
    pub fn is_displayable(
        &self,
        action: &Action,
        current: &Action,
        protect: bool,
        has_selection: bool,
        mandatory: bool,
        with_link_context: bool,
    ) -> bool {
        let security: &dyn SecurityService = self.store.security().as_ref();
        action.is_displayable(
            security,
            current,
            protect,
            has_selection,
            mandatory,
            with_link_context,
        )
    }

    /// Send the user to `action`
    ///
    /// From a menu, an input action given no keys asks the `menu-action`
    /// hook for them; finding none publishes a user message and stops. The
    /// `override-action` hook may then substitute another action, which is
    /// redirected to instead. Actions without a screen, detaches and
    /// attaches chained from an attach screen are executed in place;
    /// anything else is navigated to.
    pub fn redirect_to_page_action(
        &self,
        action: Arc<Action>,
        redirect: Redirect,
    ) -> BoxFuture<'static, NavResult<()>> {
        let this = self.clone();
        async move { this.redirect(action, redirect).await }.boxed()
    }

    async fn redirect(&self, action: Arc<Action>, redirect: Redirect) -> NavResult<()> {
        let Redirect {
            pks,
            functions,
            options,
            from_menu,
            next_action,
        } = redirect;
        let entity = action.entity().front.clone();
        tracing::debug!(
            entity = %entity,
            action = %action.name().front,
            pks = ?pks,
            from_menu,
            next_action,
            "redirecting to action"
        );

        let params = HookParams::new()
            .with("actionName", action.name().front.clone())
            .with_action(action.clone())
            .with_options(options.clone());

        let pks = if from_menu && action.has_input() && pks.is_empty() {
            let keys = self
                .store
                .registry()
                .invoke(MENU_ACTION, &entity, ACTION_COMPONENT, json!({}), params.clone())
                .await?
                .into_keys(MENU_ACTION)?
                .unwrap_or_default();
            if keys.is_empty() {
                tracing::warn!(entity = %entity, "menu action yielded no element");
                self.store.events().publish(NavigationEvent::Message(
                    UserMessage::danger(MENU_ACTION_NO_ELEMENT).with_parameter("entity", entity),
                ));
                return Ok(());
            }
            keys
        } else {
            pks
        };

        let substitute = self
            .store
            .registry()
            .invoke(
                OVERRIDE_ACTION,
                &entity,
                ACTION_COMPONENT,
                json!({}),
                params.with_pks(pks.clone()),
            )
            .await?
            .into_redirect(OVERRIDE_ACTION)?;
        if let Some(substitute) = substitute {
            if *substitute.action != *action {
                tracing::debug!(
                    entity = %substitute.action.entity().front,
                    action = %substitute.action.name().front,
                    "action overridden"
                );
                let redirect = Redirect {
                    pks: substitute.pks.unwrap_or(pks),
                    functions,
                    options: substitute.options.or(options),
                    from_menu,
                    next_action,
                };
                return self
                    .redirect_to_page_action(substitute.action, redirect)
                    .await;
            }
        }

        self.do_redirect(action, pks, functions, options, from_menu, next_action)
            .await
    }

    async fn do_redirect(
        &self,
        action: Arc<Action>,
        pks: Vec<String>,
        functions: Option<ContextFunctions>,
        options: Option<ContextOptions>,
        from_menu: bool,
        next_action: bool,
    ) -> NavResult<()> {
        let context = if from_menu {
            self.store.init_current(action.clone(), pks.clone(), true)
        } else {
            self.store.require_current()?
        };
        let current_action = context.action();

        let in_place = action.is_ui_none()
            || action.is_detach()
            || (action.is_attach() && current_action.is_attach());
        if in_place {
            if self.store.current().is_none() {
                // menu action run in place on an empty stack
                self.store.set_next(context, false)?;
            }
            return self
                .execute(&action, pks, &current_action, functions, options)
                .await;
        }

        if from_menu {
            self.store.go_to(context);
            return Ok(());
        }

        let next = if next_action {
            self.store.replace_current(current_action, pks)?
        } else {
            let keys = if action.has_input() { pks } else { Vec::new() };
            let options = if action.has_link_process() {
                options
            } else {
                None
            };
            let Some(next) = self.store.create_next(Some(action.clone()), keys, options)? else {
                return Ok(());
            };
            self.store.set_next(next.clone(), false)?;
            next
        };
        if let Some(functions) = functions {
            next.set_functions(functions);
        }
        self.store.go_to(next);
        Ok(())
    }

    /// Execute `action` from a screen running `current_action`
    ///
    /// Nothing happens when the `validate-action` hook refuses. A failing
    /// backend call is returned as is and leaves the stack untouched.
    pub async fn execute(
        &self,
        action: &Arc<Action>,
        pks: Vec<String>,
        current_action: &Arc<Action>,
        functions: Option<ContextFunctions>,
        options: Option<ContextOptions>,
    ) -> NavResult<()> {
        let current = self.store.require_current()?;
        let params = HookParams::new()
            .with("actionName", current_action.name().front.clone())
            .with_action(current_action.clone())
            .with_pks(pks.clone())
            .with_options(options.clone());
        let bean = current.data(false).unwrap_or_else(|| json!({}));
        let valid = self
            .store
            .registry()
            .invoke(
                VALIDATE_ACTION,
                &action.entity().front,
                ACTION_COMPONENT,
                bean,
                params,
            )
            .await?
            .into_bool(VALIDATE_ACTION)?;
        if !valid {
            tracing::debug!(
                entity = %action.entity().front,
                action = %action.name().front,
                "execution refused by validation"
            );
            return Ok(());
        }
        self.do_execute(action, pks, current_action, functions, options, current)
            .await
    }

    async fn do_execute(
        &self,
        action: &Arc<Action>,
        pks: Vec<String>,
        current_action: &Arc<Action>,
        functions: Option<ContextFunctions>,
        options: Option<ContextOptions>,
        current: Arc<Context>,
    ) -> NavResult<()> {
        let strategy = ExecutionStrategy::of(action).ok_or_else(|| ActionError::InvalidOperation {
            action: action.name().front.clone(),
            message: "no execution strategy matches the action".to_string(),
        })?;
        tracing::debug!(
            entity = %action.entity().front,
            action = %action.name().front,
            strategy = ?strategy,
            pks = ?pks,
            "executing action"
        );

        let ticket = self.store.ticket();
        let execution = Execution {
            action: action.clone(),
            context: current.clone(),
            pks: pks.clone(),
            current_action: current_action.clone(),
            options: options.clone(),
            ticket,
        };
        let default = self.clone().run_strategy(strategy, execution).boxed();
        let next_context = match current.take_execute() {
            Some(execute) => {
                execute(ExecuteRequest {
                    action: action.clone(),
                    context: current.clone(),
                    pks,
                    current_action: current_action.clone(),
                    options: options.clone(),
                    default,
                })
                .await?
            }
            None => default.await?,
        };

        if !self.store.is_live(ticket) {
            tracing::debug!(
                action = %action.name().front,
                "navigation moved during execution, result dropped"
            );
            return Ok(());
        }

        if self
            .go_to_next_action(action, current_action, current.pks(), options, &current)
            .await?
        {
            return Ok(());
        }

        let need_reload =
            action.is_ui_none() || (action.is_detach() && !current_action.is_detach());
        let target = if let Some(next) = next_context {
            self.store.set_next(next.clone(), false)?;
            if let Some(functions) = functions {
                next.set_functions(functions);
            }
            next
        } else if need_reload {
            current
        } else if let Some(step) = current.next_step_context(false) {
            self.store.set_next(step.clone(), true)?;
            step
        } else if let Some(previous) = current.previous() {
            previous
        } else {
            self.store.go_home();
            return Ok(());
        };
        self.store.go_to(target);
        Ok(())
    }

    async fn run_strategy(
        self,
        strategy: ExecutionStrategy,
        execution: Execution,
    ) -> NavResult<Option<Arc<Context>>> {
        match strategy {
            ExecutionStrategy::Read => Ok(None),
            ExecutionStrategy::Update => self.execute_update(execution).await,
            ExecutionStrategy::Create => self.execute_create(execution).await,
            ExecutionStrategy::Delete => self.execute_delete(execution).await,
        }
    }

    async fn execute_create(&self, execution: Execution) -> NavResult<Option<Arc<Context>>> {
        let action = &execution.action;
        let response = if action.has_link_process() {
            let link = self.link_of(&execution)?;
            let data = execution
                .context
                .previous()
                .and_then(|previous| previous.data(false));
            let data = self.data_to_send(action, data);
            self.rest
                .link(action, &execution.pks, &link, data.as_ref())
                .await
        } else {
            let data = execution.context.data(false);
            self.rest.create(action, data.as_ref()).await
        };
        let response = response.inspect_err(|e| log_failure(action, "create", e))?;
        Ok(self.after_execute(&execution, response))
    }

    async fn execute_update(&self, execution: Execution) -> NavResult<Option<Arc<Context>>> {
        let action = &execution.action;
        let pks = &execution.pks;
        let data = self.data_to_send(action, execution.context.data(false));
        let response = if action.has_multiple_input() {
            self.rest.multiple_save(pks, action, data.as_ref()).await
        } else if action.has_single_input() {
            match pks.as_slice() {
                [pk] => self.rest.save(pk, action, data.as_ref()).await,
                _ => return Err(invalid_operation(action, "cannot update multiple pks")),
            }
        } else {
            self.rest.no_input_update(action).await
        };
        let response = response.inspect_err(|e| log_failure(action, "update", e))?;
        Ok(self.after_execute(&execution, response))
    }

    async fn execute_delete(&self, execution: Execution) -> NavResult<Option<Arc<Context>>> {
        let action = &execution.action;
        let pks = &execution.pks;
        let response = if action.has_link_process() {
            let link = self.link_of(&execution)?;
            let data = self.data_to_send(action, execution.context.data(false));
            self.rest.link(action, pks, &link, data.as_ref()).await
        } else if *execution.current_action != **action && !action.is_ui_none() {
            // confirmation screen before deleting
            return self
                .store
                .create_next(Some(action.clone()), pks.clone(), None);
        } else if action.has_multiple_input() {
            if pks.is_empty() {
                return Err(invalid_operation(action, "cannot delete without pks"));
            }
            let data = self.data_to_send(action, execution.context.data(false));
            self.rest.delete_multiple(pks, action, data.as_ref()).await
        } else if action.has_single_input() {
            let [pk] = pks.as_slice() else {
                return Err(invalid_operation(action, "cannot delete multiple pks"));
            };
            let data = self.data_to_send(action, execution.context.data(false));
            self.rest.delete(pk, action, data.as_ref()).await
        } else {
            return Err(invalid_operation(action, "delete needs an input"));
        };
        let response = response.inspect_err(|e| log_failure(action, "delete", e))?;
        Ok(self.after_execute(&execution, response))
    }

    /// Apply a successful response to the executed context
    ///
    /// The data is refreshed unless the screen deletes or the action has no
    /// screen; a returned `primaryKey` becomes the first key. The installed
    /// `after_execute` callback then picks the next context.
    fn after_execute(&self, execution: &Execution, response: RestResponse) -> Option<Arc<Context>> {
        let context = &execution.context;
        if !self.store.is_live(execution.ticket) || context.is_destroyed() {
            tracing::debug!("context left before the backend answered");
            return None;
        }
        if !context.action().is_delete() && !execution.action.is_ui_none() {
            if let Some(pk) = response.data.get("primaryKey").and_then(Value::as_str) {
                context.set_first_pk(pk.to_string());
            }
            let data = (!response.data.is_null()).then(|| response.data.clone());
            context.set_data(data);
        }
        context
            .take_after_execute()
            .and_then(|callback| callback(&response.data))
    }

    /// Chain to the action picked by the `next-action` hook
    ///
    /// Returns whether a redirection took place. Going from an action
    /// without input to one with input carries the key of the current bean.
    async fn go_to_next_action(
        &self,
        action: &Arc<Action>,
        current_action: &Arc<Action>,
        pks: Vec<String>,
        options: Option<ContextOptions>,
        context: &Arc<Context>,
    ) -> NavResult<bool> {
        let params = HookParams::new()
            .with("actionName", current_action.name().front.clone())
            .with_action(current_action.clone())
            .with_pks(pks.clone())
            .with_options(options);
        let bean = context.data(false).unwrap_or(Value::Null);
        let redirect = self
            .store
            .registry()
            .invoke(
                NEXT_ACTION,
                &action.entity().front,
                ACTION_COMPONENT,
                bean.clone(),
                params,
            )
            .await?
            .into_redirect(NEXT_ACTION)?;
        let Some(redirect) = redirect else {
            return Ok(false);
        };

        let keys = if current_action.has_no_input() && redirect.action.has_input() {
            let entity = self.store.model().entity(&current_action.entity().front)?;
            if entity.is_primary_key_full(&bean) {
                entity.string_primary_key_of(&bean).into_iter().collect()
            } else {
                Vec::new()
            }
        } else {
            pks
        };
        tracing::debug!(
            from = %current_action.name().front,
            to = %redirect.action.name().front,
            pks = ?keys,
            "chaining next action"
        );

        context.set_action(redirect.action.clone());
        let chained = Redirect {
            pks: keys,
            functions: Some(redirect.functions.unwrap_or_default()),
            options: redirect.options,
            from_menu: false,
            next_action: true,
        };
        self.redirect_to_page_action(redirect.action, chained)
            .await?;
        Ok(true)
    }

    /// Leave the screen of `action` without executing it
    ///
    /// Once the `cancel-action` hook agrees, a flow moves on to its next
    /// key when `skip_one` is set; otherwise the previous screen is shown.
    pub async fn cancel(&self, action: &Arc<Action>, skip_one: bool) -> NavResult<()> {
        let current = self.store.require_current()?;
        let params = HookParams::new()
            .with("actionName", action.name().front.clone())
            .with_action(action.clone());
        let bean = current.data(false).unwrap_or(Value::Null);
        let allowed = self
            .store
            .registry()
            .invoke(
                CANCEL_ACTION,
                &action.entity().front,
                ACTION_COMPONENT,
                bean,
                params,
            )
            .await?
            .into_bool(CANCEL_ACTION)?;
        if !allowed {
            tracing::debug!(action = %action.name().front, "cancel refused");
            return Ok(());
        }
        if skip_one {
            self.store.go_to_next_in_flow(true)
        } else {
            self.store.go_to_previous()
        }
    }

    /// Link a link-process execution runs through
    fn link_of(&self, execution: &Execution) -> NavResult<Arc<Link>> {
        execution
            .options
            .as_ref()
            .and_then(|options| options.link.clone())
            .or_else(|| execution.context.options().link)
            .ok_or_else(|| {
                ActionError::MissingLink {
                    action: execution.action.name().front.clone(),
                }
                .into()
            })
    }

    /// Body sent for `action`; actions without a screen send none
    fn data_to_send(&self, action: &Action, data: Option<Value>) -> Option<Value> {
        if action.is_ui_none() { None } else { data }
    }
}

fn invalid_operation(action: &Action, message: &str) -> crate::core::error::NavError {
    ActionError::InvalidOperation {
        action: action.name().front.clone(),
        message: message.to_string(),
    }
    .into()
}

fn log_failure(action: &Action, operation: &str, error: &crate::core::error::NavError) {
    tracing::error!(
        entity = %action.entity().front,
        action = %action.name().front,
        operation,
        error = %error,
        code = error.error_code(),
        "cannot execute action"
    );
}
