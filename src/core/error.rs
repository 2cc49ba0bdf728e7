//! Typed error handling for the navigation core
//!
//! Errors are grouped by category so callers can react to the kind of
//! failure instead of matching on strings.
//!
//! # Error Categories
//!
//! - [`ConfigError`]: wiring bugs in the declarative model (unknown names,
//!   missing hook defaults, hooks answering with an unusable value)
//! - [`StackError`]: violations of the context stack contract
//! - [`ActionError`]: an action asked to do something its declaration forbids
//! - [`RestError`]: failures reported by the REST gateway
//! - [`StorageError`]: session storage failures
//!
//! Configuration and invariant errors are fatal: they indicate a caller
//! bypassing the state machine, not a runtime condition. REST errors are
//! expected and leave the navigation state untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! match navigator.execute(&action, pks, &current, None, None).await {
//!     Ok(()) => {}
//!     Err(NavError::Rest(RestError::Status { status, .. })) => {
//!         show_message(format!("server answered {}", status));
//!     }
//!     Err(e) if e.is_fatal() => panic!("wiring bug: {}", e),
//!     Err(e) => show_message(e.to_string()),
//! }
//! ```

use thiserror::Error;

/// The main error type of the crate
#[derive(Debug, Clone, Error)]
pub enum NavError {
    /// Declarative model or hook wiring errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Context stack contract violations
    #[error(transparent)]
    Stack(#[from] StackError),

    /// Action execution errors
    #[error(transparent)]
    Action(#[from] ActionError),

    /// REST gateway errors
    #[error(transparent)]
    Rest(#[from] RestError),

    /// Session storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NavError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            NavError::Config(e) => e.error_code(),
            NavError::Stack(e) => e.error_code(),
            NavError::Action(e) => e.error_code(),
            NavError::Rest(e) => e.error_code(),
            NavError::Storage(_) => "STORAGE_ERROR",
            NavError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error denotes a programming or configuration bug
    ///
    /// Fatal errors must never be reachable through the gated UI; non-fatal
    /// ones (network, storage) are surfaced to the user and may be retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            NavError::Config(_) | NavError::Stack(_) | NavError::Action(_) => true,
            NavError::Internal(_) => true,
            NavError::Rest(_) | NavError::Storage(_) => false,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the declarative model or in the customization wiring
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Entity was never added to the model
    #[error("Entity {entity} doesn't exist")]
    UnknownEntity { entity: String },

    /// Action is not declared on the entity
    #[error("Action {action} doesn't exist on entity {entity}")]
    UnknownAction { entity: String, action: String },

    /// Link is not declared on the entity
    #[error("Link {link} doesn't exist on entity {entity}")]
    UnknownLink { entity: String, link: String },

    /// A hook was requested for a component type without a default
    #[error("No default implementation of hook '{function}' for component '{component}'")]
    MissingDefaultHook { function: String, component: String },

    /// A hook resolved to a value its caller cannot use
    #[error("The custom function {function} must resolve to {expected}")]
    UnexpectedHookValue {
        function: String,
        expected: &'static str,
    },

    /// Failed to parse a configuration document
    #[error("Failed to parse configuration {}: {message}", .file.as_deref().unwrap_or("<inline>"))]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// I/O error while reading configuration
    #[error("I/O error reading configuration: {message}")]
    IoError { message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            ConfigError::UnknownAction { .. } => "UNKNOWN_ACTION",
            ConfigError::UnknownLink { .. } => "UNKNOWN_LINK",
            ConfigError::MissingDefaultHook { .. } => "MISSING_DEFAULT_HOOK",
            ConfigError::UnexpectedHookValue { .. } => "UNEXPECTED_HOOK_VALUE",
            ConfigError::ParseError { .. } => "CONFIG_PARSE_ERROR",
            ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }
}

// =============================================================================
// Stack Errors
// =============================================================================

/// Violations of the context stack contract
#[derive(Debug, Clone, Error)]
pub enum StackError {
    /// A context was pushed at the wrong position
    #[error(
        "Context {given} cannot be added onto the context stack at {current} (flow replace: {flow_replace})"
    )]
    OutOfSequence {
        current: usize,
        given: usize,
        flow_replace: bool,
    },

    /// An operation needs a current context and there is none
    #[error("No current context")]
    NoCurrentContext,

    /// A flow operation was requested outside of a flow
    #[error("Cannot go to next in flow because flow is not set")]
    NotInFlow,

    /// The persisted context chain could not be rebuilt
    #[error("Error during context restoration: {message}")]
    Restore { message: String },
}

impl StackError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StackError::OutOfSequence { .. } => "CONTEXT_OUT_OF_SEQUENCE",
            StackError::NoCurrentContext => "NO_CURRENT_CONTEXT",
            StackError::NotInFlow => "NOT_IN_FLOW",
            StackError::Restore { .. } => "CONTEXT_RESTORE_FAILED",
        }
    }
}

// =============================================================================
// Action Errors
// =============================================================================

/// Errors raised by the action state machine
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// The action cannot run with the given arguments
    #[error("Invalid operation on action {action}: {message}")]
    InvalidOperation { action: String, message: String },

    /// A link-process action was executed without a link in its options
    #[error("Action {action} needs a link to be executed")]
    MissingLink { action: String },
}

impl ActionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ActionError::InvalidOperation { .. } => "INVALID_OPERATION",
            ActionError::MissingLink { .. } => "MISSING_LINK",
        }
    }
}

// =============================================================================
// REST Errors
// =============================================================================

/// Errors reported by a REST gateway
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// Backend answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    /// The request could not be sent
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The response body could not be decoded
    #[error("Cannot decode response: {message}")]
    Decode { message: String },

    /// The requested entity does not exist on the backend
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },
}

impl RestError {
    pub fn error_code(&self) -> &'static str {
        match self {
            RestError::Status { .. } => "REST_STATUS",
            RestError::Transport { .. } => "REST_TRANSPORT",
            RestError::Decode { .. } => "REST_DECODE",
            RestError::NotFound { .. } => "REST_NOT_FOUND",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors of a session storage backend
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Session storage error: {message}")]
    Backend { message: String },
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for NavError {
    fn from(err: serde_json::Error) -> Self {
        NavError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for NavError {
    fn from(err: serde_yaml::Error) -> Self {
        NavError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for NavError {
    fn from(err: std::io::Error) -> Self {
        NavError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<anyhow::Error> for NavError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<NavError>() {
            Ok(nav) => nav,
            Err(other) => NavError::Internal(other.to_string()),
        }
    }
}

/// A specialized Result type for navigation operations
pub type NavResult<T> = Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_entity_display() {
        let err = ConfigError::UnknownEntity {
            entity: "balise".to_string(),
        };
        assert!(err.to_string().contains("balise"));
        assert_eq!(err.error_code(), "UNKNOWN_ENTITY");
    }

    #[test]
    fn test_out_of_sequence_is_fatal() {
        let err: NavError = StackError::OutOfSequence {
            current: 2,
            given: 5,
            flow_replace: false,
        }
        .into();
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), "CONTEXT_OUT_OF_SEQUENCE");
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_rest_error_is_not_fatal() {
        let err: NavError = RestError::Status {
            status: 500,
            url: "/balise".to_string(),
        }
        .into();
        assert!(!err.is_fatal());
        assert_eq!(err.error_code(), "REST_STATUS");
    }

    #[test]
    fn test_missing_default_hook_display() {
        let err = ConfigError::MissingDefaultHook {
            function: "label".to_string(),
            component: "var".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("label"));
        assert!(display.contains("var"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: NavError = json_err.into();
        assert!(matches!(
            err,
            NavError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_from_anyhow_keeps_nav_error() {
        let original: NavError = StackError::NotInFlow.into();
        let wrapped = anyhow::Error::new(original);
        let back: NavError = wrapped.into();
        assert!(matches!(back, NavError::Stack(StackError::NotInFlow)));
    }
}
