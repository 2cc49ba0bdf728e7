//! Restoring the context chain after a reload or a restart

mod harness;

use harness::*;
use serde_json::json;
use std::sync::Arc;
use this_nav::prelude::*;

/// A user whose session expired
struct Disconnected;

impl SecurityService for Disconnected {
    fn is_connected(&self) -> bool {
        false
    }

    fn can_use_function(&self, _: SecurityTarget<'_>) -> bool {
        true
    }
}

fn navigator_on(
    storage: Arc<dyn SessionStorage>,
    location: Arc<MemoryLocation>,
    security: Arc<dyn SecurityService>,
) -> Navigator {
    let config = ModelConfig::from_yaml_str(MODEL).unwrap();
    let model = Arc::new(EntityModel::from_config(&config));
    NavigatorBuilder::new()
        .with_entity_model(model.clone())
        .with_session_storage(storage)
        .with_location(location)
        .with_security(security)
        .with_rest_gateway(InMemoryRestGateway::new(model))
        .build()
        .unwrap()
}

/// Harness sharing the session of `h`, opened on its current url
fn reloaded(h: &Harness) -> Harness {
    Harness::with_storage(h.storage.clone(), MemoryLocation::new(h.location.url()))
}

#[tokio::test]
async fn test_chain_survives_reload() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    h.open("balise", "list", vec![]).await;
    h.push("balise", "display", vec![pk.clone()]).await;
    h.push("balise", "edit", vec![pk.clone()]).await;

    let after = reloaded(&h);
    assert!(after.store().current().is_none());
    let restored = after.store().get_current(false).unwrap();

    assert_eq!(restored.id_context(), 2);
    assert_eq!(restored.pks(), vec![pk.clone()]);
    let screens: Vec<String> = restored
        .chain()
        .iter()
        .map(|frame| frame.action().name().front.clone())
        .collect();
    assert_eq!(screens, ["list", "display", "edit"]);
    assert_eq!(after.location.url(), h.location.url());

    // restored frames start without data
    assert!(!restored.has_data());
    after.rest.insert("balise", json!({"id": 4, "name": "B4"})).unwrap();
    assert_eq!(after.load().await["name"], "B4");
    assert_eq!(after.rest.call_count("entity"), 1);
}

#[tokio::test]
async fn test_flow_position_is_restored() {
    let h = Harness::new();
    let pks: Vec<String> = (1..=3)
        .map(|id| h.insert("balise", json!({"id": id})))
        .collect();
    h.open("balise", "list", vec![]).await;
    let first = h.push("balise", "edit", pks.clone()).await;
    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, first.pks(), &edit, None, None)
        .await
        .unwrap();

    let after = reloaded(&h);
    let restored = after.store().get_current(false).unwrap();
    let flow = restored.flow().unwrap();
    assert_eq!(restored.pks(), vec![pks[1].clone()]);
    assert_eq!(flow.id, 1);
    assert_eq!(flow.pks, pks);
    assert_eq!(flow.executed_pks, vec![pks[0].clone()]);

    // the restored flow carries on where it stopped
    after.navigator.cancel(&after.action("balise", "edit"), true).await.unwrap();
    assert_eq!(after.current().pks(), vec![pks[2].clone()]);
}

#[tokio::test]
async fn test_link_screen_is_not_resumed() {
    let h = Harness::new();
    let site = h.insert("site", json!({"id": 1}));
    h.open("site", "display", vec![site.clone()]).await;
    h.navigator
        .redirect_to_page_action(
            h.action("balise", "attach"),
            Redirect::default().options(ContextOptions::with_link(h.link("site", "balises"))),
        )
        .await
        .unwrap();
    assert_eq!(h.current().id_context(), 1);

    let after = reloaded(&h);
    let mut rx = after.store().events().subscribe();
    let restored = after.store().get_current(false).unwrap();

    assert_eq!(after.current_screen(), ("site".to_string(), "display".to_string()));
    assert_eq!(restored.id_context(), 0);
    assert_eq!(restored.pks(), vec![site]);
    assert_eq!(after.location.url(), restored.get_path());
    assert_eq!(drain_kinds(&mut rx), ["context_restored", "context_changed"]);
}

#[tokio::test]
async fn test_root_location_is_not_restored() {
    let h = Harness::new();
    h.open("balise", "list", vec![]).await;
    assert!(!h.storage.is_empty());

    let after = Harness::with_storage(h.storage.clone(), MemoryLocation::default());
    assert!(after.store().get_current(false).is_none());
    assert_eq!(after.location.url(), "/");
}

#[tokio::test]
async fn test_disconnected_user_loses_the_chain() {
    let h = Harness::new();
    h.open("balise", "list", vec![]).await;
    let url = h.location.url();

    let location = Arc::new(MemoryLocation::new(url));
    let navigator = navigator_on(h.storage.clone(), location.clone(), Arc::new(Disconnected));

    assert!(navigator.store().get_current(false).is_none());
    assert!(h.storage.is_empty());
    assert_eq!(location.url(), "/");
}

#[tokio::test]
async fn test_no_redirect_skips_restoration() {
    let h = Harness::new();
    h.open("balise", "list", vec![]).await;

    let after = reloaded(&h);
    assert!(after.store().get_current(true).is_none());
    assert!(!after.storage.is_empty());
}

#[tokio::test]
async fn test_file_storage_restores_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let url = {
        let storage = Arc::new(FileSessionStorage::open(&path).unwrap());
        let location = Arc::new(MemoryLocation::default());
        let navigator = navigator_on(storage, location.clone(), Arc::new(AllowAll));
        let list = navigator.store().model().action("site", "list").unwrap();
        navigator
            .redirect_to_page_action(list, Redirect::default().from_menu())
            .await
            .unwrap();
        location.url()
    };
    assert!(path.exists());

    let storage = Arc::new(FileSessionStorage::open(&path).unwrap());
    let location = Arc::new(MemoryLocation::new(url));
    let navigator = navigator_on(storage, location, Arc::new(AllowAll));
    let restored = navigator.store().get_current(false).unwrap();
    assert_eq!(restored.action().entity().front, "site");
    assert_eq!(restored.action().name().front, "list");
}
