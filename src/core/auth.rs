//! Security functions
//!
//! The backend grants a list of security functions to the connected user.
//! Each row names either a menu entry (`menu` / `menuOption`) or an action
//! of an entity (`action` / `entite`, both back names). An empty list grants
//! everything.

use crate::core::action::Action;
use crate::core::error::NavResult;
use crate::core::events::{EventBus, NavigationEvent};
use crate::storage::SessionStorage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session key of the access token
pub const SESSION_TOKEN_KEY: &str = "session.accessToken";
/// Session key of the login of the connected user
pub const SESSION_LOGIN_KEY: &str = "session.login";
/// Session key of the serialized security functions
pub const SESSION_SECURITY_FUNCTIONS_KEY: &str = "session.security-functions";

/// What a permission check is about
#[derive(Debug, Clone, Copy)]
pub enum SecurityTarget<'a> {
    /// A menu entry or menu option id
    Menu(&'a str),
    Action(&'a Action),
}

/// Permission checks consulted by action gating and menu filtering
pub trait SecurityService: Send + Sync {
    /// Whether a user session is open
    fn is_connected(&self) -> bool;

    fn can_use_function(&self, target: SecurityTarget<'_>) -> bool;
}

/// Grants everything to an always connected user (for development)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SecurityService for AllowAll {
    fn is_connected(&self) -> bool {
        true
    }

    fn can_use_function(&self, _: SecurityTarget<'_>) -> bool {
        true
    }
}

/// One security function granted by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFunction {
    #[serde(default)]
    pub menu: Option<String>,

    #[serde(rename = "menuOption", default)]
    pub menu_option: Option<String>,

    /// Back name of the action
    #[serde(default)]
    pub action: Option<String>,

    /// Back name of the entity
    #[serde(default)]
    pub entite: Option<String>,
}

impl SecurityFunction {
    pub fn action(entity_back: impl Into<String>, action_back: impl Into<String>) -> Self {
        Self {
            action: Some(action_back.into()),
            entite: Some(entity_back.into()),
            ..Default::default()
        }
    }

    pub fn menu(menu: impl Into<String>) -> Self {
        Self {
            menu: Some(menu.into()),
            ..Default::default()
        }
    }

    fn grants(&self, target: SecurityTarget<'_>) -> bool {
        match target {
            SecurityTarget::Menu(id) => {
                self.menu.as_deref() == Some(id) || self.menu_option.as_deref() == Some(id)
            }
            SecurityTarget::Action(action) => {
                self.action.as_deref() == Some(action.name().back.as_str())
                    && self.entite.as_deref() == Some(action.entity().back.as_str())
            }
        }
    }
}

/// Security functions kept in the session storage
///
/// Holds the token and the functions granted at login. A filtered view can
/// narrow the granted functions without touching the stored ones.
pub struct SessionSecurity {
    storage: Arc<dyn SessionStorage>,
    disable_security: bool,
    filtered: RwLock<Option<Vec<SecurityFunction>>>,
    events: Option<EventBus>,
}

impl SessionSecurity {
    pub fn new(storage: Arc<dyn SessionStorage>, disable_security: bool) -> Self {
        Self {
            storage,
            disable_security,
            filtered: RwLock::new(None),
            events: None,
        }
    }

    /// Publish `SecurityFunctionsUpdated` on this bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Open a session with the token, login and functions returned at login
    pub fn connect(
        &self,
        token: &str,
        login: &str,
        functions: &[SecurityFunction],
    ) -> NavResult<()> {
        self.storage.set(SESSION_LOGIN_KEY, login)?;
        self.storage.set(SESSION_TOKEN_KEY, token)?;
        if !self.disable_security {
            self.storage.set(
                SESSION_SECURITY_FUNCTIONS_KEY,
                &serde_json::to_string(functions)?,
            )?;
            self.fire_updated();
        }
        tracing::info!(login, "session opened");
        Ok(())
    }

    /// Clear the whole session
    pub fn log_out(&self) -> NavResult<()> {
        *self.filtered.write() = None;
        self.storage.clear()?;
        tracing::info!("session closed");
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(SESSION_TOKEN_KEY).ok().flatten()
    }

    /// Functions granted at login, empty when none were stored
    pub fn security_functions(&self) -> Vec<SecurityFunction> {
        self.storage
            .get(SESSION_SECURITY_FUNCTIONS_KEY)
            .ok()
            .flatten()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(functions) => Some(functions),
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable security functions in session");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Restrict checks to the stored functions accepted by `filter`
    pub fn filter<F>(&self, filter: F)
    where
        F: Fn(&SecurityFunction) -> bool,
    {
        let kept = self
            .security_functions()
            .into_iter()
            .filter(|function| filter(function))
            .collect();
        *self.filtered.write() = Some(kept);
        self.fire_updated();
    }

    /// Drop the filtered view
    pub fn clear_filter(&self) {
        *self.filtered.write() = None;
        self.fire_updated();
    }

    fn fire_updated(&self) {
        if let Some(events) = &self.events {
            events.publish(NavigationEvent::SecurityFunctionsUpdated);
        }
    }
}

impl SecurityService for SessionSecurity {
    fn is_connected(&self) -> bool {
        self.token().is_some_and(|token| !token.is_empty())
    }

    fn can_use_function(&self, target: SecurityTarget<'_>) -> bool {
        if self.disable_security {
            return true;
        }
        let stored = self.security_functions();
        if stored.is_empty() {
            return true;
        }
        match self.filtered.read().as_ref() {
            Some(filtered) => filtered.iter().any(|f| f.grants(target)),
            None => stored.iter().any(|f| f.grants(target)),
        }
    }
}
