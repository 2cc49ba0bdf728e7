//! Shared harness for navigation integration tests
//!
//! Provides a fixture model (`balise` screens plus a `site` owning balises
//! through a link), a navigator wired on in-memory collaborators, and a few
//! helpers to put the stack in a known state.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod harness;
//! use harness::*;
//! ```

#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use this_nav::prelude::*;

pub const MODEL: &str = r#"
entities:
  - name: { front: balise, back: BALISE }
    pk: [id]
    pkMap: { id: I }
    actions:
      - name: { front: list, back: LIST }
        input: query
        persistence: none
        io-flux: display
        read-only: true
      - name: { front: display, back: DISPLAY }
        label: balise.display
        input: object-one
        persistence: none
        io-flux: display
        read-only: true
      - name: { front: create, back: CREATE }
        label: balise.create
        input: none
        persistence: insert
        io-flux: input
        next-action: display
      - name: { front: edit, back: EDIT }
        input: object-one
        persistence: update
        io-flux: input
        sub-actions:
          - code: { front: close, back: CLOSE }
      - name: { front: edit-all, back: EDIT_ALL }
        input: object-multiple
        persistence: update
        io-flux: input
      - name: { front: delete, back: DELETE }
        input: object-one
        persistence: delete
        io-flux: display
      - name: { front: purge, back: PURGE }
        input: object-multiple
        persistence: delete
        io-flux: none
      - name: { front: refresh, back: REFRESH }
        input: none
        persistence: update
        io-flux: none
      - name: { front: attach, back: ATTACH }
        process: link
        input: object-multiple
        persistence: insert
        io-flux: input
      - name: { front: detach, back: DETACH }
        process: link
        input: object-multiple
        persistence: delete
        io-flux: input
    links:
      - name: { front: site, back: SITE }
        entity: site
        fk: { siteId: id }
    queries:
      - name: { front: balise, back: BALISE }

  - name: { front: site, back: SITE }
    pk: [id]
    pkMap: { id: I }
    actions:
      - name: { front: list, back: LIST }
        input: query
        persistence: none
        io-flux: display
        read-only: true
      - name: { front: display, back: DISPLAY }
        input: object-one
        persistence: none
        io-flux: display
        read-only: true
    links:
      - name: { front: balises, back: BALISES }
        entity: balise
        fk: { siteId: id }
"#;

/// Navigator wired on in-memory collaborators
pub struct Harness {
    pub navigator: Navigator,
    pub rest: Arc<InMemoryRestGateway>,
    pub location: Arc<MemoryLocation>,
    pub storage: Arc<MemorySessionStorage>,
    pub registry: Arc<CustomizationRegistry>,
    pub model: Arc<EntityModel>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemorySessionStorage::new()), MemoryLocation::default())
    }

    /// Harness sharing a session storage, as after a page reload
    pub fn with_storage(storage: Arc<MemorySessionStorage>, location: MemoryLocation) -> Self {
        let config = ModelConfig::from_yaml_str(MODEL).expect("fixture model parses");
        let model = Arc::new(EntityModel::from_config(&config));
        let registry = Arc::new(CustomizationRegistry::new());
        register_defaults(&registry, model.clone());
        let rest = Arc::new(InMemoryRestGateway::new(model.clone()));
        let location = Arc::new(location);

        let navigator = NavigatorBuilder::new()
            .with_entity_model(model.clone())
            .with_registry(registry.clone())
            .with_session_storage(storage.clone())
            .with_location(location.clone())
            .with_security(Arc::new(AllowAll))
            .with_shared_rest_gateway(rest.clone())
            .with_event_bus(64)
            .build()
            .expect("navigator builds");

        Self {
            navigator,
            rest,
            location,
            storage,
            registry,
            model,
        }
    }

    pub fn store(&self) -> &Arc<NavigationStore> {
        self.navigator.store()
    }

    pub fn action(&self, entity: &str, action: &str) -> Arc<Action> {
        self.model
            .action(entity, action)
            .expect("fixture action exists")
    }

    pub fn current(&self) -> Arc<Context> {
        self.store().current().expect("a current context")
    }

    /// Entity and action names of the current context
    pub fn current_screen(&self) -> (String, String) {
        let action = self.current().action();
        (action.entity().front.clone(), action.name().front.clone())
    }

    /// Start the stack on `entity/action` as from a menu entry
    pub async fn open(&self, entity: &str, action: &str, pks: Vec<String>) -> Arc<Context> {
        self.navigator
            .redirect_to_page_action(
                self.action(entity, action),
                Redirect::with_pks(pks).from_menu(),
            )
            .await
            .expect("menu redirection succeeds");
        self.current()
    }

    /// Push `entity/action` above the current context
    pub async fn push(&self, entity: &str, action: &str, pks: Vec<String>) -> Arc<Context> {
        self.navigator
            .redirect_to_page_action(self.action(entity, action), Redirect::with_pks(pks))
            .await
            .expect("redirection succeeds");
        self.current()
    }

    /// Load the data of the current context
    pub async fn load(&self) -> Value {
        let current = self.current();
        self.navigator
            .loader()
            .load_data(&current.action(), &current.pks(), None)
            .await
            .expect("data loads")
    }

    pub fn insert(&self, entity: &str, bean: Value) -> String {
        self.rest.insert(entity, bean).expect("bean inserted")
    }

    pub fn link(&self, entity: &str, link: &str) -> Arc<Link> {
        self.model
            .entity(entity)
            .ok()
            .and_then(|e| e.link(link))
            .expect("fixture link exists")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the kinds of the events already published on `rx`
pub fn drain_kinds(rx: &mut tokio::sync::broadcast::Receiver<EventEnvelope>) -> Vec<String> {
    let mut kinds = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        kinds.push(envelope.event.event_kind().to_string());
    }
    kinds
}
