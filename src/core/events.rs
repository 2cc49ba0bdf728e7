//! Navigation events
//!
//! The navigation store and the navigator publish what happens to the
//! context stack on an [`EventBus`] backed by `tokio::sync::broadcast`. UI
//! shells subscribe to it to follow the current screen, show user messages
//! and refresh menus when the security functions change.
//!
//! ```rust,ignore
//! let mut rx = store.events().subscribe();
//! while let Ok(envelope) = rx.recv().await {
//!     match envelope.event {
//!         NavigationEvent::ContextChanged { path, .. } => router.show(&path),
//!         NavigationEvent::Message(message) => toaster.show(message),
//!         _ => {}
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

/// Severity of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Danger,
}

/// A message for the user, `display` being a translation key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub display: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub level: MessageLevel,
}

impl UserMessage {
    pub fn danger(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            parameters: Map::new(),
            level: MessageLevel::Danger,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Something that happened to the navigation state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// A context became current and the location moved to its path
    ContextChanged {
        id_context: usize,
        entity: String,
        action: String,
        path: String,
    },
    /// The context chain was rebuilt from the session storage
    ContextRestored { id_context: usize },
    /// The stack was emptied (home, logout, failed restoration)
    ContextCleared,
    /// The current context dropped its data and must be reloaded
    Reloaded { id_context: usize },
    Message(UserMessage),
    SecurityFunctionsUpdated,
}

impl NavigationEvent {
    pub fn event_kind(&self) -> &str {
        match self {
            NavigationEvent::ContextChanged { .. } => "context_changed",
            NavigationEvent::ContextRestored { .. } => "context_restored",
            NavigationEvent::ContextCleared => "context_cleared",
            NavigationEvent::Reloaded { .. } => "reloaded",
            NavigationEvent::Message(_) => "message",
            NavigationEvent::SecurityFunctionsUpdated => "security_functions_updated",
        }
    }
}

/// Envelope wrapping a navigation event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: NavigationEvent,
}

impl EventEnvelope {
    pub fn new(event: NavigationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone. Subscribers receive events in publish order; events
/// published before a subscription are not received.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails. Returns the number of receivers reached.
    pub fn publish(&self, event: NavigationEvent) -> usize {
        tracing::trace!(kind = event.event_kind(), "publishing navigation event");
        // send() only errors without receivers
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream
    ///
    /// A subscriber lagging behind the bus capacity skips the events it
    /// missed instead of ending.
    pub fn stream(&self) -> impl Stream<Item = EventEnvelope> + use<> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| match item {
            Ok(envelope) => Some(envelope),
            Err(lagged) => {
                tracing::warn!(error = %lagged, "navigation event subscriber lagging");
                None
            }
        })
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
