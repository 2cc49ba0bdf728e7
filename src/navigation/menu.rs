//! Application menu
//!
//! Menu entries either start an action of an entity or open a custom path.
//! The `entries` hook (component `menu`) lets applications add entries to
//! a group at run time; [`filter_menu`] then drops what the user may not
//! use.

use crate::context::ContextOptions;
use crate::core::auth::{SecurityService, SecurityTarget};
use crate::core::customization::{CustomizationRegistry, HookParams, HookValue};
use crate::core::error::{ConfigError, NavResult};
use crate::core::hooks::{MENU_COMPONENT, MENU_ENTRIES};
use crate::navigation::navigator::{Navigator, Redirect};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity name the `entries` hook is resolved for
pub const MENU_ENTITY: &str = "noEntityName";

/// One entry of the menu, possibly a group of nested entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Translation key of the label
    pub display: String,

    /// Security id of the entry
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Custom path opened instead of an action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<MenuEntry>,

    /// Position a custom entry is inserted at within its group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl MenuEntry {
    /// An entry needs a label and either an action or a path
    pub fn is_valid(&self) -> bool {
        !self.display.is_empty()
            && ((self.entity.is_some() && self.action.is_some()) || self.href.is_some())
    }

    pub fn is_group(&self) -> bool {
        !self.nested.is_empty()
    }
}

/// Entries the user may use, groups keeping their allowed children
pub fn filter_menu(entries: &[MenuEntry], security: &dyn SecurityService) -> Vec<MenuEntry> {
    entries
        .iter()
        .filter(|entry| security.can_use_function(SecurityTarget::Menu(&entry.id)))
        .map(|entry| MenuEntry {
            nested: filter_menu(&entry.nested, security),
            ..entry.clone()
        })
        .collect()
}

/// Ask the `entries` hook for extra entries of every group
///
/// The hook gets the `display` of the group as `menu` parameter. Valid
/// entries are inserted at their `index` when it falls within the group,
/// appended otherwise; invalid ones are skipped. Entries added this way
/// are not asked for entries themselves.
pub fn add_custom_entries<'a>(
    entries: &'a mut [MenuEntry],
    registry: &'a CustomizationRegistry,
) -> BoxFuture<'a, NavResult<()>> {
    async move {
        for entry in entries.iter_mut().filter(|entry| entry.is_group()) {
            add_custom_entries(&mut entry.nested, registry).await?;

            let params = HookParams::new().with("menu", entry.display.clone());
            let value = registry
                .invoke(MENU_ENTRIES, MENU_ENTITY, MENU_COMPONENT, Value::Null, params)
                .await?;
            for custom in custom_entries(value)? {
                let position = custom
                    .index
                    .and_then(|index| usize::try_from(index).ok())
                    .filter(|index| *index < entry.nested.len());
                tracing::debug!(menu = %entry.display, entry = %custom.display, "custom menu entry");
                match position {
                    Some(index) => entry.nested.insert(index, custom),
                    None => entry.nested.push(custom),
                }
            }
        }
        Ok(())
    }
    .boxed()
}

fn custom_entries(value: HookValue) -> NavResult<Vec<MenuEntry>> {
    let items = match value {
        HookValue::None | HookValue::Json(Value::Null) => return Ok(Vec::new()),
        HookValue::Json(Value::Array(items)) => items,
        _ => {
            return Err(ConfigError::UnexpectedHookValue {
                function: MENU_ENTRIES.to_string(),
                expected: "a list of menu entries",
            }
            .into());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<MenuEntry>(item.clone()) {
            Ok(entry) if entry.is_valid() => Some(entry),
            _ => {
                tracing::debug!(entry = %item, "not a valid menu entry");
                None
            }
        })
        .collect())
}

impl Navigator {
    /// Open a menu entry
    ///
    /// An action entry restarts the stack on its action. A path entry
    /// shows a root screen carrying that path.
    pub async fn launch_menu_entry(&self, entry: &MenuEntry) -> NavResult<()> {
        if let (Some(entity), Some(action)) = (&entry.entity, &entry.action) {
            let action = self.store().model().action(entity, action)?;
            tracing::debug!(menu = %entry.id, entity = %entity, "launching menu action");
            return self
                .redirect_to_page_action(
                    action,
                    Redirect::default().from_menu().options(ContextOptions::default()),
                )
                .await;
        }
        if let Some(href) = &entry.href {
            let dummy = self.store().model().dummy_action();
            let context = self.store().init_current(dummy, Vec::new(), true);
            context.set_custom_path(href.clone());
            self.store().go_to(context);
        }
        Ok(())
    }
}
