//! Action descriptors
//!
//! An [`Action`] is the static description of one operation on an entity:
//! its persistence kind, the input it needs, its process and whether it has
//! a user interface. These four axes drive both the gating logic
//! ([`Action::is_displayable`]) and the REST call the navigator issues when
//! the action is executed.

use crate::core::auth::{SecurityService, SecurityTarget};
use crate::core::entity::Name;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Kind of process run by an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Process {
    None,
    Link,
    Custom,
}

/// What an action persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persistence {
    Insert,
    Update,
    Delete,
    None,
}

/// What an action needs as input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Input {
    None,
    ObjectOne,
    ObjectMultiple,
    Query,
}

/// User interface of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IoFlux {
    None,
    Input,
    Display,
}

/// A sub-action refining how an action is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAction {
    pub code: Name,
    #[serde(default)]
    pub label: Option<String>,
}

/// Raw declaration of an action
///
/// Every classification axis is optional: an action that does not declare
/// one answers `false` to every predicate on that axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: Name,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub process: Option<Process>,

    #[serde(default)]
    pub persistence: Option<Persistence>,

    #[serde(default)]
    pub input: Option<Input>,

    #[serde(rename = "io-flux", default)]
    pub io_flux: Option<IoFlux>,

    #[serde(rename = "read-only", default)]
    pub read_only: bool,

    #[serde(rename = "sub-actions", default)]
    pub sub_actions: Vec<SubAction>,

    /// Front name of the action to chain into after this one
    #[serde(rename = "next-action", default)]
    pub next_action: Option<String>,
}

impl ActionDefinition {
    /// A bare action with no classification
    pub fn named(name: Name) -> Self {
        Self {
            name,
            label: None,
            title: None,
            icon: None,
            process: None,
            persistence: None,
            input: None,
            io_flux: None,
            read_only: false,
            sub_actions: Vec::new(),
            next_action: None,
        }
    }
}

/// An action of an entity
#[derive(Debug)]
pub struct Action {
    entity: Name,
    definition: ActionDefinition,
    selected_sub_action: RwLock<Option<SubAction>>,
}

impl PartialEq for Action {
    /// Actions are identified by their entity and their name
    fn eq(&self, other: &Self) -> bool {
        self.entity.front == other.entity.front
            && self.definition.name.front == other.definition.name.front
    }
}

impl Eq for Action {}

impl Action {
    pub fn new(definition: ActionDefinition, entity: Name) -> Self {
        Self {
            entity,
            definition,
            selected_sub_action: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &Name {
        &self.definition.name
    }

    /// Name of the entity owning this action
    pub fn entity(&self) -> &Name {
        &self.entity
    }

    pub fn label(&self) -> Option<&str> {
        self.definition.label.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.definition.title.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.definition.icon.as_deref()
    }

    pub fn process(&self) -> Option<Process> {
        self.definition.process
    }

    pub fn persistence(&self) -> Option<Persistence> {
        self.definition.persistence
    }

    pub fn input(&self) -> Option<Input> {
        self.definition.input
    }

    pub fn io_flux(&self) -> Option<IoFlux> {
        self.definition.io_flux
    }

    pub fn read_only(&self) -> bool {
        self.definition.read_only
    }

    pub fn next_action(&self) -> Option<&str> {
        self.definition.next_action.as_deref()
    }

    pub fn sub_actions(&self) -> &[SubAction] {
        &self.definition.sub_actions
    }

    /// Select the sub-action the next submission goes through
    ///
    /// Unknown codes clear the selection.
    pub fn select_sub_action(&self, code: Option<&str>) {
        let selected = code.and_then(|code| {
            self.definition
                .sub_actions
                .iter()
                .find(|sub| sub.code.front == code)
                .cloned()
        });
        *self.selected_sub_action.write() = selected;
    }

    pub fn selected_sub_action(&self) -> Option<SubAction> {
        self.selected_sub_action.read().clone()
    }

    pub fn is_edit(&self) -> bool {
        !self.definition.read_only
    }

    pub fn is_create(&self) -> bool {
        self.persistence() == Some(Persistence::Insert)
    }

    pub fn is_update(&self) -> bool {
        self.persistence() == Some(Persistence::Update)
    }

    pub fn is_delete(&self) -> bool {
        self.persistence() == Some(Persistence::Delete)
    }

    pub fn has_no_persistence(&self) -> bool {
        self.persistence() == Some(Persistence::None)
    }

    pub fn has_single_input(&self) -> bool {
        self.input() == Some(Input::ObjectOne)
    }

    pub fn has_multiple_input(&self) -> bool {
        self.input() == Some(Input::ObjectMultiple)
    }

    pub fn has_no_input(&self) -> bool {
        self.input() == Some(Input::None)
    }

    pub fn has_query_input(&self) -> bool {
        self.input() == Some(Input::Query)
    }

    /// Needs one or several selected objects
    pub fn has_input(&self) -> bool {
        self.has_single_input() || self.has_multiple_input()
    }

    pub fn has_link_process(&self) -> bool {
        self.process() == Some(Process::Link)
    }

    pub fn has_custom_process(&self) -> bool {
        self.process() == Some(Process::Custom)
    }

    /// Removes an association
    pub fn is_detach(&self) -> bool {
        self.has_link_process() && self.is_delete()
    }

    /// Adds an association
    pub fn is_attach(&self) -> bool {
        self.has_link_process() && self.is_create()
    }

    pub fn is_ui_input(&self) -> bool {
        self.io_flux() == Some(IoFlux::Input)
    }

    pub fn is_ui_display(&self) -> bool {
        self.io_flux() == Some(IoFlux::Display)
    }

    pub fn is_ui_none(&self) -> bool {
        self.io_flux() == Some(IoFlux::None)
    }

    /// Whether this action may be offered on a screen running `current`
    ///
    /// First matching rule wins:
    /// 1. the security service denies the action
    /// 2. query-input actions are never offered directly
    /// 3. detach is hidden on link screens
    /// 4. on query screens, link actions only show in link context and
    ///    other actions only outside of it
    /// 5. a read-only screen only offers read-only, non-persisting actions
    /// 6. so does a protected component
    /// 7. in link context, attach is offered and detach is hidden on
    ///    mandatory links
    /// 8. otherwise the action shows when a row is selected or it needs no
    ///    input
    pub fn is_displayable(
        &self,
        security: &dyn SecurityService,
        current: &Action,
        protect: bool,
        has_selection: bool,
        mandatory: bool,
        with_link_context: bool,
    ) -> bool {
        if !security.can_use_function(SecurityTarget::Action(self)) {
            return false;
        }
        if self.has_query_input() {
            return false;
        }
        if current.has_link_process() && self.is_detach() {
            return false;
        }
        if current.has_query_input() {
            return with_link_context == self.has_link_process();
        }
        let read_only_safe = self.read_only() && self.has_no_persistence();
        if current.read_only() && !read_only_safe {
            return false;
        }
        if protect && !read_only_safe {
            return false;
        }
        if with_link_context && self.has_link_process() {
            if self.is_create() {
                return true;
            }
            if self.is_delete() && mandatory {
                return false;
            }
        }
        has_selection || !self.has_input()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AllowAll;
    use serde_json::json;

    fn action(value: serde_json::Value) -> Action {
        let def: ActionDefinition = serde_json::from_value(value).unwrap();
        Action::new(def, Name::new("balise", "BALISE"))
    }

    fn delete_action() -> Action {
        action(json!({
            "name": {"front": "delete", "back": "DELETE"},
            "input": "object-one",
            "process": "none",
            "persistence": "delete",
            "read-only": false
        }))
    }

    fn display_screen() -> Action {
        action(json!({
            "name": {"front": "display", "back": "DISPLAY"},
            "input": "object-one",
            "persistence": "none",
            "io-flux": "display",
            "read-only": false
        }))
    }

    #[test]
    fn test_definition_parsing() {
        let a = action(json!({
            "name": {"front": "attach", "back": "ATTACH"},
            "process": "link",
            "persistence": "insert",
            "input": "object-multiple",
            "io-flux": "none",
            "next-action": "display",
            "sub-actions": [{"code": {"front": "draft", "back": "DRAFT"}}]
        }));
        assert!(a.is_attach());
        assert!(!a.is_detach());
        assert!(a.has_multiple_input());
        assert!(a.has_input());
        assert!(a.is_ui_none());
        assert_eq!(a.next_action(), Some("display"));
        assert_eq!(a.sub_actions().len(), 1);
    }

    #[test]
    fn test_undeclared_axes_answer_false() {
        let a = Action::new(
            ActionDefinition::named(Name::new("ng-dummy", "NG_DUMMY")),
            Name::new("ng-dummy", "NG_DUMMY"),
        );
        assert!(!a.has_no_persistence());
        assert!(!a.has_input());
        assert!(!a.has_no_input());
        assert!(!a.is_ui_none());
    }

    #[test]
    fn test_delete_displayable_with_selection() {
        let delete = delete_action();
        let current = display_screen();
        assert!(delete.is_displayable(&AllowAll, &current, false, true, false, false));
        assert!(!delete.is_displayable(&AllowAll, &current, false, false, false, false));
    }

    #[test]
    fn test_query_input_never_displayable() {
        let list = action(json!({"name": {"front": "list", "back": "LIST"}, "input": "query"}));
        assert!(!list.is_displayable(&AllowAll, &display_screen(), false, true, false, false));
    }

    #[test]
    fn test_link_actions_only_in_link_context_on_query_screen() {
        let list = action(json!({"name": {"front": "list", "back": "LIST"}, "input": "query"}));
        let attach = action(json!({
            "name": {"front": "attach", "back": "ATTACH"},
            "process": "link", "persistence": "insert", "input": "object-multiple"
        }));
        let create = action(json!({
            "name": {"front": "create", "back": "CREATE"},
            "persistence": "insert", "input": "none"
        }));
        assert!(attach.is_displayable(&AllowAll, &list, false, false, false, true));
        assert!(!attach.is_displayable(&AllowAll, &list, false, false, false, false));
        assert!(create.is_displayable(&AllowAll, &list, false, false, false, false));
        assert!(!create.is_displayable(&AllowAll, &list, false, false, false, true));
    }

    #[test]
    fn test_read_only_screen_and_protection() {
        let read_only_screen = action(json!({
            "name": {"front": "display", "back": "DISPLAY"},
            "input": "object-one", "persistence": "none", "read-only": true
        }));
        let consult = action(json!({
            "name": {"front": "consult", "back": "CONSULT"},
            "input": "object-one", "persistence": "none", "read-only": true
        }));
        assert!(!delete_action().is_displayable(&AllowAll, &read_only_screen, false, true, false, false));
        assert!(consult.is_displayable(&AllowAll, &read_only_screen, false, true, false, false));
        assert!(!delete_action().is_displayable(&AllowAll, &display_screen(), true, true, false, false));
        assert!(consult.is_displayable(&AllowAll, &display_screen(), true, true, false, false));
    }

    #[test]
    fn test_detach_hidden_on_mandatory_link() {
        let detach = action(json!({
            "name": {"front": "detach", "back": "DETACH"},
            "process": "link", "persistence": "delete", "input": "object-multiple"
        }));
        let screen = display_screen();
        assert!(!detach.is_displayable(&AllowAll, &screen, false, true, true, true));
        assert!(detach.is_displayable(&AllowAll, &screen, false, true, false, true));

        let link_screen = action(json!({
            "name": {"front": "attach", "back": "ATTACH"},
            "process": "link", "persistence": "insert", "input": "object-multiple"
        }));
        assert!(!detach.is_displayable(&AllowAll, &link_screen, false, true, false, true));
    }

    #[test]
    fn test_sub_action_selection() {
        let a = action(json!({
            "name": {"front": "save", "back": "SAVE"},
            "sub-actions": [{"code": {"front": "draft", "back": "DRAFT"}}]
        }));
        a.select_sub_action(Some("draft"));
        assert_eq!(a.selected_sub_action().unwrap().code.front, "draft");
        a.select_sub_action(Some("unknown"));
        assert!(a.selected_sub_action().is_none());
    }

    #[test]
    fn test_identity_by_names() {
        assert_eq!(delete_action(), delete_action());
        assert_ne!(delete_action(), display_screen());
    }
}
