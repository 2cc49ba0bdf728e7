//! Serializable form of a context chain
//!
//! Live contexts hold `Arc<Action>`s and links that cannot be serialized.
//! A [`ContextSnapshot`] identifies them by name instead, and is resolved
//! back through the [`EntityModel`] when a chain is restored.

use crate::context::context::{Context, ContextOptions, Flow};
use crate::core::error::{ConfigError, NavResult};
use crate::core::model::EntityModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Link identified by its source entity and its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub entity: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Persisted form of a context and its ancestors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    /// Front name of the entity of the action
    pub entity: String,
    /// Front name of the action
    pub action: String,
    #[serde(default)]
    pub pks: Vec<String>,
    pub id_context: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsSnapshot>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub title_tooltip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<ContextSnapshot>>,
}

impl ContextSnapshot {
    /// Capture a context and its whole chain
    pub fn capture(context: &Context) -> Self {
        let action = context.action();
        let options = context.options();
        let options = (!options.is_empty()).then(|| OptionsSnapshot {
            link: options.link.as_ref().map(|link| LinkReference {
                entity: link.src_entity().front.clone(),
                link: link.name().front.clone(),
            }),
            query: options.query.clone(),
        });
        Self {
            entity: action.entity().front.clone(),
            action: action.name().front.clone(),
            pks: context.pks(),
            id_context: context.id_context(),
            flow: context.flow(),
            options,
            title: context.title(),
            title_tooltip: context.title_tooltip(),
            custom_path: context.custom_path(),
            previous: context
                .previous()
                .map(|previous| Box::new(ContextSnapshot::capture(&previous))),
        }
    }

    /// Rebuild the chain, oldest frame first
    ///
    /// Fails when a name no longer resolves in the model.
    pub fn restore(&self, model: &EntityModel) -> NavResult<Arc<Context>> {
        let previous = match &self.previous {
            Some(previous) => Some(previous.restore(model)?),
            None => None,
        };
        let action = model.action(&self.entity, &self.action)?;
        let options = match &self.options {
            Some(options) => Some(restore_options(options, model)?),
            None => None,
        };
        let context = Context::new(
            action,
            self.pks.clone(),
            self.id_context,
            previous,
            self.flow.clone(),
            options,
        );
        context.set_title(self.title.clone());
        context.set_title_tooltip(self.title_tooltip.clone());
        if !self.custom_path.is_empty() {
            context.set_custom_path(self.custom_path.clone());
        }
        Ok(context)
    }

    /// Number of frames in the chain
    pub fn depth(&self) -> usize {
        1 + self.previous.as_ref().map_or(0, |previous| previous.depth())
    }
}

fn restore_options(options: &OptionsSnapshot, model: &EntityModel) -> NavResult<ContextOptions> {
    let link = match &options.link {
        Some(reference) => Some(model.entity(&reference.entity)?.link(&reference.link).ok_or_else(
            || ConfigError::UnknownLink {
                entity: reference.entity.clone(),
                link: reference.link.clone(),
            },
        )?),
        None => None,
    };
    Ok(ContextOptions {
        link,
        query: options.query.clone(),
    })
}

impl Context {
    /// Persistable form of this context and its ancestors
    pub fn to_snapshot(&self) -> ContextSnapshot {
        ContextSnapshot::capture(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> EntityModel {
        let model = EntityModel::new();
        model.add_entity(
            serde_json::from_value(json!({
                "name": {"front": "balise", "back": "BALISE"},
                "pk": ["id"],
                "actions": [
                    {"name": {"front": "list", "back": "LIST"}, "input": "query"},
                    {"name": {"front": "attach", "back": "ATTACH"}, "process": "link",
                     "persistence": "insert", "input": "object-multiple"}
                ],
                "links": [{"name": {"front": "photos", "back": "PHOTOS"}, "entity": "photo"}]
            }))
            .unwrap(),
        );
        model
    }

    #[test]
    fn test_capture_and_restore_chain() {
        let model = model();
        let root = Context::new(model.action("balise", "list").unwrap(), vec![], 0, None, None, None);
        root.set_title("Beacons");
        let link = model.entity("balise").unwrap().link("photos").unwrap();
        let child = Context::new(
            model.action("balise", "attach").unwrap(),
            vec!["id:::I1".into()],
            1,
            Some(root),
            None,
            Some(ContextOptions::with_link(link.clone())),
        );

        let snapshot = child.to_snapshot();
        assert_eq!(snapshot.depth(), 2);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["idContext"], 1);
        assert_eq!(json["previous"]["title"], "Beacons");
        assert_eq!(json["options"]["link"]["link"], "photos");

        let restored = snapshot.restore(&model).unwrap();
        assert_eq!(restored.id_context(), 1);
        assert_eq!(restored.pks(), vec!["id:::I1"]);
        assert_eq!(restored.options().link.as_deref(), Some(link.as_ref()));
        let previous = restored.previous().unwrap();
        assert_eq!(previous.title(), "Beacons");
        assert_eq!(previous.action().name().front, "list");
        assert_eq!(restored.to_snapshot(), snapshot);
    }

    #[test]
    fn test_restore_with_unknown_names_fails() {
        let model = model();
        let snapshot: ContextSnapshot = serde_json::from_value(json!({
            "entity": "balise",
            "action": "vanished",
            "idContext": 0
        }))
        .unwrap();
        assert_eq!(
            snapshot.restore(&model).unwrap_err().error_code(),
            "UNKNOWN_ACTION"
        );
    }
}
