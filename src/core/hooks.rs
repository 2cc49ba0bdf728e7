//! Built-in hook defaults
//!
//! Every hook the navigation layer calls needs a default for its component
//! type. [`register_defaults`] installs them; applications then add their
//! overrides on top.

use crate::core::customization::{
    ActionRedirect, CustomizationRegistry, HookCall, HookOutcome, HookValue, hook_fn,
};
use crate::core::model::EntityModel;
use std::sync::Arc;

/// Component type of the action hooks
pub const ACTION_COMPONENT: &str = "action";
/// Component type of the context title hooks
pub const CONTEXT_COMPONENT: &str = "context";
/// Component type of variable (form field) hooks
pub const VAR_COMPONENT: &str = "var";
/// Component type of menu hooks
pub const MENU_COMPONENT: &str = "menu";

pub const OVERRIDE_ACTION: &str = "override-action";
pub const MENU_ACTION: &str = "menu-action";
pub const CANCEL_ACTION: &str = "cancel-action";
pub const VALIDATE_ACTION: &str = "validate-action";
pub const CUSTOM_ACTION: &str = "custom-action";
pub const NEXT_ACTION: &str = "next-action";
pub const TITLE: &str = "title";
pub const TITLE_TOOLTIP: &str = "titleTooltip";
pub const MENU_ENTRIES: &str = "entries";

/// Install the default implementation of every built-in hook
pub fn register_defaults(registry: &CustomizationRegistry, model: Arc<EntityModel>) {
    let nothing = || hook_fn(|_| HookOutcome::ready(HookValue::None));
    let yes = || hook_fn(|_| HookOutcome::ready(HookValue::Bool(true)));
    let no = || hook_fn(|_| HookOutcome::ready(HookValue::Bool(false)));

    registry.set_default(OVERRIDE_ACTION, ACTION_COMPONENT, nothing());
    registry.set_default(MENU_ACTION, ACTION_COMPONENT, nothing());
    registry.set_default(CUSTOM_ACTION, ACTION_COMPONENT, nothing());
    registry.set_default(CANCEL_ACTION, ACTION_COMPONENT, yes());
    registry.set_default(VALIDATE_ACTION, ACTION_COMPONENT, yes());
    registry.set_default(
        NEXT_ACTION,
        ACTION_COMPONENT,
        hook_fn(move |call| HookOutcome::ready(declared_next_action(&model, &call))),
    );

    registry.set_default(
        TITLE,
        CONTEXT_COMPONENT,
        hook_fn(|call| {
            let label = call.params.action.as_ref().and_then(|a| a.label().map(String::from));
            HookOutcome::ready(HookValue::Text(label.unwrap_or_default()))
        }),
    );
    registry.set_default(
        TITLE_TOOLTIP,
        CONTEXT_COMPONENT,
        hook_fn(|call| {
            let title = call.params.action.as_ref().and_then(|a| a.title().map(String::from));
            HookOutcome::ready(HookValue::Text(title.unwrap_or_default()))
        }),
    );

    registry.set_default(
        "label",
        VAR_COMPONENT,
        hook_fn(|call| HookOutcome::ready(HookValue::Text(call.params.text("labelKey")))),
    );
    registry.set_default(
        "tooltip",
        VAR_COMPONENT,
        hook_fn(|call| HookOutcome::ready(HookValue::Text(call.params.text("tooltipKey")))),
    );
    registry.set_default(
        "placeholder",
        VAR_COMPONENT,
        hook_fn(|call| HookOutcome::ready(HookValue::Text(call.params.text("placeholderKey")))),
    );
    registry.set_default("mandatory", VAR_COMPONENT, no());
    registry.set_default("isProtected", VAR_COMPONENT, no());
    registry.set_default("isReadOnly", VAR_COMPONENT, no());
    registry.set_default("visible", VAR_COMPONENT, yes());

    registry.set_default(MENU_ENTRIES, MENU_COMPONENT, nothing());
}

/// Action named by the `next-action` attribute of the current action
fn declared_next_action(model: &EntityModel, call: &HookCall) -> HookValue {
    let Some(current) = &call.params.action else {
        return HookValue::None;
    };
    let Ok(entity) = model.entity(&call.entity) else {
        return HookValue::None;
    };
    entity
        .action(&current.name().front)
        .and_then(|declared| declared.next_action().and_then(|next| entity.action(next)))
        .map(|next| HookValue::Redirect(ActionRedirect::to(next)))
        .unwrap_or(HookValue::None)
}
