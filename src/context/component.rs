//! Component state management
//!
//! UI components that render an entity field hold a [`ComponentState`] and
//! delegate to it. It binds the component to the current context under a
//! generated id, resolves its properties (label, visibility, protection,
//! ...) through the customization hooks and saves them into the context so
//! they survive a screen reload.

use crate::context::context::{ComponentStateBlob, Context};
use crate::core::customization::{CustomizationRegistry, HookParams, HookValue};
use crate::core::error::NavResult;
use crate::core::hooks::VAR_COMPONENT;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Translation keys a component is declared with
#[derive(Debug, Clone, Default)]
pub struct ComponentKeys {
    pub var_name: Option<String>,
    pub label: Option<String>,
    pub tooltip: Option<String>,
    pub placeholder: Option<String>,
}

/// How the component is placed on the screen
#[derive(Debug, Clone, Copy, Default)]
pub struct Placement {
    /// Inside a search form: never mandatory
    pub in_search: bool,
    /// Explicitly declared mandatory
    pub mandatory: bool,
    /// The enclosing group is protected
    pub parent_protected: bool,
}

/// State of one component bound to a context
pub struct ComponentState {
    context: Arc<Context>,
    registry: Arc<CustomizationRegistry>,
    component_type: String,
    entity: String,
    name: String,
    id: String,
    keys: ComponentKeys,
    values: Map<String, Value>,
}

impl ComponentState {
    /// Bind a `var` component named `name` to a context
    pub fn bind(
        context: Arc<Context>,
        registry: Arc<CustomizationRegistry>,
        entity: impl Into<String>,
        name: impl Into<String>,
        keys: ComponentKeys,
    ) -> Self {
        Self::bind_as(context, registry, VAR_COMPONENT, entity, name, keys)
    }

    /// Bind a component of any type to a context
    pub fn bind_as(
        context: Arc<Context>,
        registry: Arc<CustomizationRegistry>,
        component_type: impl Into<String>,
        entity: impl Into<String>,
        name: impl Into<String>,
        keys: ComponentKeys,
    ) -> Self {
        let name = name.into();
        let id = context.get_component_id(&name);
        Self {
            context,
            registry,
            component_type: component_type.into(),
            entity: entity.into(),
            name,
            id,
            keys,
            values: Map::new(),
        }
    }

    /// Identifier of the component in its context
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Parameters handed to the hooks of this component
    pub fn params(&self) -> HookParams {
        let key = |k: &Option<String>| k.clone().map(Value::String).unwrap_or(Value::Null);
        HookParams::new()
            .with("id", self.id.clone())
            .with("name", self.name.clone())
            .with("entityName", self.entity.clone())
            .with("varName", key(&self.keys.var_name))
            .with("labelKey", key(&self.keys.label))
            .with("tooltipKey", key(&self.keys.tooltip))
            .with("placeholderKey", key(&self.keys.placeholder))
            .with_action(self.context.action())
            .with_context(self.context.clone())
    }

    /// Resolve one property
    ///
    /// A value saved in the context wins; otherwise the `method` hook is
    /// called and `default` is used when it yields nothing. The value is
    /// stored under `property`, or under `method` when not given.
    pub async fn initialize(
        &mut self,
        method: &str,
        default: Value,
        property: Option<&str>,
    ) -> NavResult<Value> {
        let property = property.unwrap_or(method).to_string();
        let saved = self.context.get_component_state(&self.id);
        let value = match saved.get(&property) {
            Some(value) => value.clone(),
            None => {
                let bean = self.context.data(false).unwrap_or(Value::Null);
                let resolved = self
                    .registry
                    .invoke(method, &self.entity, &self.component_type, bean, self.params())
                    .await?;
                hook_value_or(resolved, default)
            }
        };
        self.values.insert(property, value.clone());
        Ok(value)
    }

    /// Resolve every standard property
    ///
    /// Read-only actions make the component read-only and protected; a
    /// protected parent protects it too.
    pub async fn init(&mut self, placement: Placement) -> NavResult<()> {
        let read_only = self.context.action().read_only();
        self.values.insert("isReadOnly".into(), Value::Bool(read_only));

        self.initialize("label", Value::Null, None).await?;
        self.initialize("tooltip", Value::Null, None).await?;

        if placement.in_search {
            self.values.insert("isMandatory".into(), Value::Bool(false));
        } else if placement.mandatory {
            self.values.insert("isMandatory".into(), Value::Bool(true));
        } else {
            self.initialize("mandatory", Value::Bool(false), Some("isMandatory"))
                .await?;
        }

        if placement.parent_protected || read_only {
            self.values.insert("isProtected".into(), Value::Bool(true));
        } else {
            self.initialize("isProtected", Value::Bool(false), None).await?;
        }
        if !read_only {
            self.initialize("isReadOnly", Value::Bool(false), None).await?;
        }
        self.initialize("visible", Value::Bool(true), None).await?;
        Ok(())
    }

    /// Save the resolved properties plus `extra` into the context
    pub fn save_state(&self, extra: Map<String, Value>) {
        let mut state = ComponentStateBlob::new();
        for property in [
            "label",
            "tooltip",
            "isMandatory",
            "isProtected",
            "isReadOnly",
            "visible",
        ] {
            state.insert(
                property.to_string(),
                self.values.get(property).cloned().unwrap_or(Value::Null),
            );
        }
        if !self.is_protected() {
            state.extend(extra);
        }
        self.context.save_component_state(&self.id, state);
    }

    /// State saved for this component
    pub fn load(&self) -> ComponentStateBlob {
        self.context.get_component_state(&self.id)
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    fn flag(&self, property: &str) -> bool {
        self.values
            .get(property)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_visible(&self) -> bool {
        self.flag("visible")
    }

    pub fn is_protected(&self) -> bool {
        self.flag("isProtected")
    }

    pub fn is_read_only(&self) -> bool {
        self.flag("isReadOnly")
    }

    pub fn is_mandatory(&self) -> bool {
        self.flag("isMandatory")
    }
}

fn hook_value_or(value: HookValue, default: Value) -> Value {
    match value {
        HookValue::None | HookValue::Json(Value::Null) | HookValue::Redirect(_) => default,
        HookValue::Bool(b) => Value::Bool(b),
        HookValue::Text(s) => Value::String(s),
        HookValue::Json(v) => v,
        HookValue::Keys(keys) => Value::from(keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::customization::{HookOutcome, criteria, hook_fn};
    use crate::core::hooks::register_defaults;
    use crate::core::model::EntityModel;
    use serde_json::json;

    fn setup(read_only: bool) -> (Arc<Context>, Arc<CustomizationRegistry>) {
        let model = Arc::new(EntityModel::new());
        model.add_entity(
            serde_json::from_value(json!({
                "name": {"front": "balise", "back": "BALISE"},
                "pk": ["id"],
                "actions": [{"name": {"front": "edit", "back": "EDIT"}, "input": "object-one",
                             "persistence": "update", "read-only": read_only}]
            }))
            .unwrap(),
        );
        let registry = Arc::new(CustomizationRegistry::new());
        register_defaults(&registry, model.clone());
        let context = Context::new(model.action("balise", "edit").unwrap(), vec![], 0, None, None, None);
        (context, registry)
    }

    fn keys() -> ComponentKeys {
        ComponentKeys {
            label: Some("balise.name".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_init_resolves_defaults() {
        let (context, registry) = setup(false);
        let mut state = ComponentState::bind(context, registry, "balise", "name", keys());
        state.init(Placement::default()).await.unwrap();
        assert_eq!(state.get("label"), Some(&json!("balise.name")));
        assert!(state.is_visible());
        assert!(!state.is_protected());
        assert!(!state.is_mandatory());
        assert!(!state.is_read_only());
    }

    #[tokio::test]
    async fn test_read_only_action_protects() {
        let (context, registry) = setup(true);
        let mut state = ComponentState::bind(context, registry, "balise", "name", keys());
        state.init(Placement::default()).await.unwrap();
        assert!(state.is_protected());
        assert!(state.is_read_only());
    }

    #[tokio::test]
    async fn test_overrides_apply_per_component_name() {
        let (context, registry) = setup(false);
        registry.add_override(
            "visible",
            "balise",
            VAR_COMPONENT,
            hook_fn(|_| HookOutcome::ready(HookValue::Bool(false))),
            Some(criteria(json!({"name": "secret"}))),
        );
        let mut secret = ComponentState::bind(context.clone(), registry.clone(), "balise", "secret", keys());
        secret.init(Placement::default()).await.unwrap();
        assert!(!secret.is_visible());

        let mut name = ComponentState::bind(context, registry, "balise", "name", keys());
        name.init(Placement::default()).await.unwrap();
        assert!(name.is_visible());
    }

    #[tokio::test]
    async fn test_saved_state_wins_over_hooks() {
        let (context, registry) = setup(false);
        let mut first = ComponentState::bind(context.clone(), registry.clone(), "balise", "name", keys());
        first.init(Placement { mandatory: true, ..Default::default() }).await.unwrap();
        let mut extra = Map::new();
        extra.insert("$dirty".into(), json!(true));
        first.save_state(extra);
        assert_eq!(first.load()["$dirty"], json!(true));

        context.reset_component_ids();
        let mut again = ComponentState::bind(context, registry, "balise", "name", keys());
        assert_eq!(again.id(), first.id());
        let mandatory = again
            .initialize("mandatory", json!(false), Some("isMandatory"))
            .await
            .unwrap();
        assert_eq!(mandatory, json!(true));
    }

    #[tokio::test]
    async fn test_repeated_components_get_distinct_ids() {
        let (context, registry) = setup(false);
        let a = ComponentState::bind(context.clone(), registry.clone(), "balise", "address", keys());
        let b = ComponentState::bind(context, registry, "balise", "address", keys());
        assert_eq!(a.id(), "address");
        assert_eq!(b.id(), "address-2");
    }
}
