//! Customization hooks
//!
//! Any component can ask the registry for a named hook (`label`, `visible`,
//! `validate-action`, ...) and receive the implementation best suited to the
//! current entity. Every `(function, component)` pair needs a default; on top
//! of it, overrides are registered per entity with optional criteria.
//!
//! # Resolution
//!
//! At call time every override registered for `(function, component,
//! entity)` is scored against the call parameters:
//!
//! - `-1` when any criterion differs from the parameter of the same key
//! - the number of criteria otherwise (`0` for an override without criteria)
//!
//! Starting from the default at score `0`, the last registered override with
//! the highest score wins. The chosen hook receives the default as
//! [`HookCall::default`] so it can delegate to it.
//!
//! ```rust,ignore
//! let registry = CustomizationRegistry::new();
//! registry.set_default("label", "var", hook_fn(|call| {
//!     HookOutcome::ready(HookValue::Text(call.params.text("labelKey")))
//! }));
//! registry.register_override("label")(
//!     "balise", "var",
//!     hook_fn(|_| HookOutcome::ready(HookValue::Text("Beacon".into()))),
//!     Some(criteria(json!({"name": "title"}))),
//! );
//! let label = registry.invoke("label", "balise", "var", Value::Null, params).await?;
//! ```

use crate::context::{Context, ContextFunctions, ContextOptions};
use crate::core::action::Action;
use crate::core::error::{ConfigError, NavResult};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A hook implementation
pub type HookFn = Arc<dyn Fn(HookCall) -> HookOutcome + Send + Sync>;

/// Wrap a closure into a [`HookFn`]
pub fn hook_fn<F>(f: F) -> HookFn
where
    F: Fn(HookCall) -> HookOutcome + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a criteria map from a JSON object
///
/// Anything other than an object yields no criteria.
pub fn criteria(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Where a hook sends the user instead of the requested action
pub struct ActionRedirect {
    pub action: Arc<Action>,
    pub pks: Option<Vec<String>>,
    pub options: Option<ContextOptions>,
    pub functions: Option<ContextFunctions>,
}

impl ActionRedirect {
    pub fn to(action: Arc<Action>) -> Self {
        Self {
            action,
            pks: None,
            options: None,
            functions: None,
        }
    }

    pub fn with_pks(mut self, pks: Vec<String>) -> Self {
        self.pks = Some(pks);
        self
    }

    pub fn with_options(mut self, options: ContextOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl fmt::Debug for ActionRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRedirect")
            .field("entity", &self.action.entity().front)
            .field("action", &self.action.name().front)
            .field("pks", &self.pks)
            .field("options", &self.options)
            .finish()
    }
}

/// Value a hook resolves to
#[derive(Debug)]
pub enum HookValue {
    None,
    Bool(bool),
    Text(String),
    Json(Value),
    Keys(Vec<String>),
    Redirect(ActionRedirect),
}

impl HookValue {
    /// Truthiness of the value, `None` and null being false
    pub fn truthy(&self) -> bool {
        match self {
            HookValue::None => false,
            HookValue::Bool(b) => *b,
            HookValue::Text(s) => !s.is_empty(),
            HookValue::Json(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::String(s) => !s.is_empty(),
                Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
                _ => true,
            },
            HookValue::Keys(_) | HookValue::Redirect(_) => true,
        }
    }

    /// Display form of the value
    pub fn into_text(self) -> String {
        match self {
            HookValue::None => String::new(),
            HookValue::Bool(b) => b.to_string(),
            HookValue::Text(s) => s,
            HookValue::Json(Value::String(s)) => s,
            HookValue::Json(Value::Null) => String::new(),
            HookValue::Json(value) => value.to_string(),
            HookValue::Keys(keys) => keys.join(","),
            HookValue::Redirect(redirect) => redirect.action.name().front.clone(),
        }
    }

    /// Primary keys, `None` meaning the hook supplied none
    pub fn into_keys(self, function: &str) -> NavResult<Option<Vec<String>>> {
        match self {
            HookValue::None | HookValue::Json(Value::Null) => Ok(None),
            HookValue::Keys(keys) => Ok(Some(keys)),
            HookValue::Json(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(unexpected(function, "a list of keys")),
                })
                .collect::<NavResult<Vec<_>>>()
                .map(Some),
            _ => Err(unexpected(function, "a list of keys")),
        }
    }

    /// Redirection target, `None` meaning no redirection
    pub fn into_redirect(self, function: &str) -> NavResult<Option<ActionRedirect>> {
        match self {
            HookValue::None | HookValue::Json(Value::Null) => Ok(None),
            HookValue::Redirect(redirect) => Ok(Some(redirect)),
            _ => Err(unexpected(function, "an action redirection")),
        }
    }

    /// Boolean answer; anything that is not a boolean is a wiring error
    pub fn into_bool(self, function: &str) -> NavResult<bool> {
        match self {
            HookValue::Bool(b) | HookValue::Json(Value::Bool(b)) => Ok(b),
            HookValue::None | HookValue::Json(Value::Null) => Ok(false),
            _ => Err(unexpected(function, "a boolean")),
        }
    }
}

fn unexpected(function: &str, expected: &'static str) -> crate::core::error::NavError {
    ConfigError::UnexpectedHookValue {
        function: function.to_string(),
        expected,
    }
    .into()
}

/// Result of a hook: either available now or still being computed
pub enum HookOutcome {
    Ready(HookValue),
    Pending(BoxFuture<'static, NavResult<HookValue>>),
}

impl HookOutcome {
    pub fn ready(value: HookValue) -> Self {
        HookOutcome::Ready(value)
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: std::future::Future<Output = NavResult<HookValue>> + Send + 'static,
    {
        HookOutcome::Pending(Box::pin(future))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, HookOutcome::Ready(_))
    }

    pub async fn resolve(self) -> NavResult<HookValue> {
        match self {
            HookOutcome::Ready(value) => Ok(value),
            HookOutcome::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            HookOutcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Parameters handed to a hook
///
/// `values` is what criteria are matched against; the typed fields carry
/// the live objects a hook may need.
#[derive(Clone, Default)]
pub struct HookParams {
    pub values: Map<String, Value>,
    pub action: Option<Arc<Action>>,
    pub pks: Option<Vec<String>>,
    pub options: Option<ContextOptions>,
    pub context: Option<Arc<Context>>,
}

impl HookParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_action(mut self, action: Arc<Action>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_pks(mut self, pks: Vec<String>) -> Self {
        self.pks = Some(pks);
        self
    }

    pub fn with_options(mut self, options: Option<ContextOptions>) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String parameter, empty when missing
    pub fn text(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

impl fmt::Debug for HookParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookParams")
            .field("values", &self.values)
            .field("action", &self.action.as_ref().map(|a| a.name().front.clone()))
            .field("pks", &self.pks)
            .finish()
    }
}

/// One invocation of a hook
pub struct HookCall {
    pub entity: String,
    pub bean: Value,
    pub params: HookParams,
    /// Default implementation for the component, to delegate to
    pub default: HookFn,
}

impl HookCall {
    /// Run the default implementation with the same arguments
    pub fn delegate(self) -> HookOutcome {
        let default = self.default.clone();
        default(self)
    }
}

/// An override and the criteria it applies under
#[derive(Clone)]
pub struct Rule {
    pub criteria: Map<String, Value>,
    pub hook: HookFn,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("criteria", &self.criteria)
            .finish_non_exhaustive()
    }
}

/// Score of a set of criteria against call parameters
///
/// `-1` on any mismatch, otherwise the number of criteria.
pub fn match_score(criteria: &Map<String, Value>, params: &Map<String, Value>) -> i64 {
    let all_match = criteria
        .iter()
        .all(|(key, expected)| params.get(key) == Some(expected));
    if all_match { criteria.len() as i64 } else { -1 }
}

/// Best rule for the parameters, `None` when the default should apply
///
/// The default competes with score 0 and ties go to the rule registered
/// last.
pub fn select_best<'a>(rules: &'a [Rule], params: &Map<String, Value>) -> Option<&'a Rule> {
    let mut best = None;
    let mut best_score = 0;
    for rule in rules {
        let score = match_score(&rule.criteria, params);
        if score >= best_score {
            best_score = score;
            best = Some(rule);
        }
    }
    best
}

type OverrideKey = (String, String, String);

/// Registry of hook defaults and per-entity overrides
#[derive(Default)]
pub struct CustomizationRegistry {
    defaults: RwLock<HashMap<(String, String), HookFn>>,
    overrides: RwLock<HashMap<OverrideKey, Vec<Rule>>>,
}

impl fmt::Debug for CustomizationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut defaults: Vec<_> = self.defaults.read().keys().cloned().collect();
        defaults.sort();
        f.debug_struct("CustomizationRegistry")
            .field("defaults", &defaults)
            .field("overrides", &self.overrides.read().len())
            .finish()
    }
}

impl CustomizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the fallback implementation of a hook for a component type
    pub fn set_default(&self, function: &str, component: &str, hook: HookFn) {
        self.defaults
            .write()
            .insert((function.to_string(), component.to_string()), hook);
    }

    pub fn has_default(&self, function: &str, component: &str) -> bool {
        self.defaults
            .read()
            .contains_key(&(function.to_string(), component.to_string()))
    }

    /// Registrar of overrides for one hook
    ///
    /// The returned closure takes `(entity, component, hook, criteria)`.
    pub fn register_override<'a>(
        &'a self,
        function: &'a str,
    ) -> impl Fn(&str, &str, HookFn, Option<Map<String, Value>>) + 'a {
        move |entity, component, hook, criteria| {
            self.add_override(function, entity, component, hook, criteria)
        }
    }

    /// Append an override of `function` for a component type of an entity
    pub fn add_override(
        &self,
        function: &str,
        entity: &str,
        component: &str,
        hook: HookFn,
        criteria: Option<Map<String, Value>>,
    ) {
        tracing::debug!(function, entity, component, "registering hook override");
        self.overrides
            .write()
            .entry((
                function.to_string(),
                component.to_string(),
                entity.to_string(),
            ))
            .or_default()
            .push(Rule {
                criteria: criteria.unwrap_or_default(),
                hook,
            });
    }

    /// Callable resolving `function` at call time
    pub fn get<'a>(&'a self, function: &'a str) -> HookInvoker<'a> {
        HookInvoker {
            registry: self,
            function,
        }
    }

    /// Resolve and await a hook in one step
    pub async fn invoke(
        &self,
        function: &str,
        entity: &str,
        component: &str,
        bean: Value,
        params: HookParams,
    ) -> NavResult<HookValue> {
        self.get(function)
            .call(entity, component, bean, params)?
            .resolve()
            .await
    }

    /// Chosen hook and default for a call
    fn resolve(
        &self,
        function: &str,
        entity: &str,
        component: &str,
        params: &HookParams,
    ) -> NavResult<(HookFn, HookFn)> {
        let default = self
            .defaults
            .read()
            .get(&(function.to_string(), component.to_string()))
            .cloned()
            .ok_or_else(|| {
                tracing::error!(function, component, "hook has no default implementation");
                ConfigError::MissingDefaultHook {
                    function: function.to_string(),
                    component: component.to_string(),
                }
            })?;

        let overrides = self.overrides.read();
        let key = (
            function.to_string(),
            component.to_string(),
            entity.to_string(),
        );
        let chosen = overrides
            .get(&key)
            .and_then(|rules| select_best(rules, &params.values))
            .map(|rule| rule.hook.clone())
            .unwrap_or_else(|| default.clone());
        Ok((chosen, default))
    }
}

/// A hook bound to its name, resolved against the registry when called
pub struct HookInvoker<'a> {
    registry: &'a CustomizationRegistry,
    function: &'a str,
}

impl HookInvoker<'_> {
    pub fn call(
        &self,
        entity: &str,
        component: &str,
        bean: Value,
        params: HookParams,
    ) -> NavResult<HookOutcome> {
        let (hook, default) = self
            .registry
            .resolve(self.function, entity, component, &params)?;
        Ok(hook(HookCall {
            entity: entity.to_string(),
            bean,
            params,
            default,
        }))
    }
}
