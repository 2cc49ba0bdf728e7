//! Action execution flows driven through the navigator
//!
//! Every test starts from an empty stack on the fixture model and checks
//! both the backend calls and the screen the user ends up on.

mod harness;

use futures::FutureExt;
use harness::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use this_nav::core::hooks::{
    ACTION_COMPONENT, CANCEL_ACTION, MENU_ACTION, OVERRIDE_ACTION, VALIDATE_ACTION,
};
use this_nav::navigation::MENU_ACTION_NO_ELEMENT;
use this_nav::prelude::*;

// =============================================================================
// Redirection
// =============================================================================

#[tokio::test]
async fn test_menu_redirect_starts_a_root_screen() {
    let h = Harness::new();
    let list = h.open("balise", "list", vec![]).await;

    assert_eq!(list.id_context(), 0);
    assert!(list.previous().is_none());
    assert_eq!(h.location.url(), list.get_path());
    assert!(h.location.url().starts_with("/balise/list"));
}

#[tokio::test]
async fn test_redirect_pushes_above_current() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4, "name": "B4"}));
    let list = h.open("balise", "list", vec![]).await;

    let display = h.push("balise", "display", vec![pk.clone()]).await;
    assert_eq!(display.id_context(), 1);
    assert_eq!(display.pks(), vec![pk]);
    assert!(Arc::ptr_eq(&display.previous().unwrap(), &list));
    assert_eq!(h.store().breadcrumb().len(), 2);
}

#[tokio::test]
async fn test_menu_action_without_keys_aborts() {
    let h = Harness::new();
    let mut rx = h.store().events().subscribe();

    h.navigator
        .redirect_to_page_action(h.action("balise", "edit"), Redirect::default().from_menu())
        .await
        .unwrap();

    assert!(h.store().current().is_none());
    let envelope = rx.try_recv().unwrap();
    match envelope.event {
        NavigationEvent::Message(message) => {
            assert_eq!(message.display, MENU_ACTION_NO_ELEMENT);
            assert_eq!(message.level, MessageLevel::Danger);
            assert_eq!(message.parameters["entity"], "balise");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_menu_action_hook_supplies_keys() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 9}));
    let keys = vec![pk.clone()];
    h.registry.register_override(MENU_ACTION)(
        "balise",
        ACTION_COMPONENT,
        hook_fn(move |_| HookOutcome::ready(HookValue::Keys(keys.clone()))),
        None,
    );

    h.navigator
        .redirect_to_page_action(h.action("balise", "edit"), Redirect::default().from_menu())
        .await
        .unwrap();

    assert_eq!(h.current_screen(), ("balise".to_string(), "edit".to_string()));
    assert_eq!(h.current().pks(), vec![pk]);
}

#[tokio::test]
async fn test_override_action_substitutes_target() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 2}));
    let edit = h.action("balise", "edit");
    h.registry.register_override(OVERRIDE_ACTION)(
        "balise",
        ACTION_COMPONENT,
        hook_fn(move |_| HookOutcome::ready(HookValue::Redirect(ActionRedirect::to(edit.clone())))),
        Some(criteria(json!({"actionName": "display"}))),
    );

    h.open("balise", "display", vec![pk.clone()]).await;

    assert_eq!(h.current_screen(), ("balise".to_string(), "edit".to_string()));
    assert_eq!(h.current().pks(), vec![pk]);
}

// =============================================================================
// Execution strategies
// =============================================================================

#[tokio::test]
async fn test_create_chains_into_next_action() {
    let h = Harness::new();
    h.open("balise", "list", vec![]).await;
    let create_screen = h.push("balise", "create", vec![]).await;
    assert_eq!(create_screen.id_context(), 1);
    assert!(create_screen.pks().is_empty());

    create_screen.set_data(Some(json!({"name": "B1"})));
    let create = h.action("balise", "create");
    h.navigator
        .execute(&create, vec![], &create, None, None)
        .await
        .unwrap();

    assert_eq!(h.rest.call_count("create"), 1);
    let beans = h.rest.beans("balise");
    assert_eq!(beans.len(), 1);
    assert_eq!(beans[0]["name"], "B1");

    let current = h.current();
    assert_eq!(h.current_screen(), ("balise".to_string(), "display".to_string()));
    assert_eq!(current.id_context(), 1);
    assert_eq!(current.pks(), vec!["id:::I1".to_string()]);
    assert_eq!(current.previous().unwrap().action().name().front, "list");
}

#[tokio::test]
async fn test_update_saves_and_goes_back() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4, "name": "B4"}));
    let display = h.open("balise", "display", vec![pk.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;

    let loaded = h.load().await;
    assert_eq!(loaded["name"], "B4");
    edit_screen.update_data(|bean| bean["name"] = json!("B4 bis"));

    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, vec![pk.clone()], &edit, None, None)
        .await
        .unwrap();

    assert_eq!(h.rest.get("balise", &pk).unwrap()["name"], "B4 bis");
    assert!(Arc::ptr_eq(&h.current(), &display));
    assert!(edit_screen.is_destroyed());
}

#[tokio::test]
async fn test_failed_call_leaves_stack_unchanged() {
    let h = Harness::new();
    let missing = "id:::I99".to_string();
    h.open("balise", "display", vec![missing.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![missing.clone()]).await;
    edit_screen.set_data(Some(json!({"id": 99, "name": "ghost"})));
    let url = h.location.url();

    let edit = h.action("balise", "edit");
    let err = h
        .navigator
        .execute(&edit, vec![missing], &edit, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "REST_NOT_FOUND");
    assert!(!err.is_fatal());
    assert!(Arc::ptr_eq(&h.current(), &edit_screen));
    assert_eq!(edit_screen.data(false).unwrap()["name"], "ghost");
    assert_eq!(h.location.url(), url);
}

#[tokio::test]
async fn test_update_with_several_keys_is_invalid() {
    let h = Harness::new();
    let a = h.insert("balise", json!({"id": 1}));
    let b = h.insert("balise", json!({"id": 2}));
    h.open("balise", "display", vec![a.clone()]).await;

    let edit = h.action("balise", "edit");
    let err = h
        .navigator
        .execute(&edit, vec![a, b], &edit, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_OPERATION");
    assert!(err.is_fatal());
    assert_eq!(h.rest.call_count("save"), 0);
}

#[tokio::test]
async fn test_multiple_update_saves_every_key() {
    let h = Harness::new();
    let a = h.insert("balise", json!({"id": 1, "status": "open"}));
    let b = h.insert("balise", json!({"id": 2, "status": "open"}));
    h.open("balise", "list", vec![]).await;
    let screen = h.push("balise", "edit-all", vec![a.clone(), b.clone()]).await;
    assert_eq!(screen.pks().len(), 2);
    screen.set_data(Some(json!({"status": "closed"})));

    let edit_all = h.action("balise", "edit-all");
    h.navigator
        .execute(&edit_all, screen.pks(), &edit_all, None, None)
        .await
        .unwrap();

    assert_eq!(h.rest.call_count("multiple_save"), 1);
    assert_eq!(h.rest.get("balise", &a).unwrap()["status"], "closed");
    assert_eq!(h.rest.get("balise", &b).unwrap()["status"], "closed");
    assert_eq!(h.current_screen(), ("balise".to_string(), "list".to_string()));
}

#[tokio::test]
async fn test_delete_goes_through_confirmation() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 7}));
    let list = h.open("balise", "list", vec![]).await;
    let delete = h.action("balise", "delete");

    // from the list: the confirmation screen is pushed, nothing is deleted
    let list_action = list.action();
    h.navigator
        .execute(&delete, vec![pk.clone()], &list_action, None, None)
        .await
        .unwrap();
    assert_eq!(h.rest.call_count("delete"), 0);
    let confirmation = h.current();
    assert_eq!(confirmation.action().name().front, "delete");
    assert_eq!(confirmation.id_context(), 1);

    // confirmed: deleted, back on the list
    h.navigator
        .execute(&delete, vec![pk.clone()], &delete, None, None)
        .await
        .unwrap();
    assert_eq!(h.rest.call_count("delete"), 1);
    assert!(h.rest.get("balise", &pk).is_none());
    assert!(Arc::ptr_eq(&h.current(), &list));
}

#[tokio::test]
async fn test_delete_arity_is_checked() {
    let h = Harness::new();
    let a = h.insert("balise", json!({"id": 1}));
    let b = h.insert("balise", json!({"id": 2}));
    h.open("balise", "display", vec![a.clone()]).await;

    let delete = h.action("balise", "delete");
    let err = h
        .navigator
        .execute(&delete, vec![a, b], &delete, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_OPERATION");

    let purge = h.action("balise", "purge");
    let err = h
        .navigator
        .execute(&purge, vec![], &purge, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_OPERATION");
    assert_eq!(h.rest.beans("balise").len(), 2);
}

#[tokio::test]
async fn test_action_without_screen_runs_in_place_and_reloads() {
    let h = Harness::new();
    let a = h.insert("balise", json!({"id": 1}));
    let b = h.insert("balise", json!({"id": 2}));
    h.insert("balise", json!({"id": 3}));
    let list = h.open("balise", "list", vec![]).await;
    h.load().await;
    assert_eq!(h.location.reload_count(), 0);

    h.navigator
        .redirect_to_page_action(h.action("balise", "purge"), Redirect::with_pks(vec![a, b]))
        .await
        .unwrap();

    assert_eq!(h.rest.call_count("delete_multiple"), 1);
    assert_eq!(h.rest.beans("balise").len(), 1);
    assert!(Arc::ptr_eq(&h.current(), &list));
    assert!(!list.has_data());
    assert_eq!(h.location.reload_count(), 1);
}

#[tokio::test]
async fn test_no_input_update_sends_no_body() {
    let h = Harness::new();
    let list = h.open("balise", "list", vec![]).await;

    h.navigator
        .redirect_to_page_action(h.action("balise", "refresh"), Redirect::default())
        .await
        .unwrap();

    assert_eq!(h.rest.call_count("no_input_update"), 1);
    assert!(Arc::ptr_eq(&h.current(), &list));
}

#[tokio::test]
async fn test_validation_refusal_is_silent() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4, "name": "B4"}));
    h.open("balise", "display", vec![pk.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;
    edit_screen.set_data(Some(json!({"id": 4, "name": ""})));
    h.registry.register_override(VALIDATE_ACTION)(
        "balise",
        ACTION_COMPONENT,
        hook_fn(|call| {
            let named = call.bean["name"].as_str().is_some_and(|name| !name.is_empty());
            HookOutcome::ready(HookValue::Bool(named))
        }),
        None,
    );

    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, vec![pk.clone()], &edit, None, None)
        .await
        .unwrap();

    assert_eq!(h.rest.total_calls(), 0);
    assert!(Arc::ptr_eq(&h.current(), &edit_screen));
}

#[tokio::test]
async fn test_validate_hook_must_resolve_to_bool() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    h.open("balise", "edit", vec![pk.clone()]).await;
    h.registry.register_override(VALIDATE_ACTION)(
        "balise",
        ACTION_COMPONENT,
        hook_fn(|_| HookOutcome::ready(HookValue::Text("yes".to_string()))),
        None,
    );

    let edit = h.action("balise", "edit");
    let err = h
        .navigator
        .execute(&edit, vec![pk], &edit, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "UNEXPECTED_HOOK_VALUE");
}

// =============================================================================
// Flows and cancellation
// =============================================================================

#[tokio::test]
async fn test_flow_walks_every_key() {
    let h = Harness::new();
    let pks: Vec<String> = (1..=3)
        .map(|id| h.insert("balise", json!({"id": id})))
        .collect();
    let list = h.open("balise", "list", vec![]).await;
    let edit = h.action("balise", "edit");

    let first = h.push("balise", "edit", pks.clone()).await;
    assert_eq!(first.pks(), vec![pks[0].clone()]);
    assert_eq!(first.flow().unwrap().pks, pks);

    h.navigator
        .execute(&edit, first.pks(), &edit, None, None)
        .await
        .unwrap();
    let second = h.current();
    assert_eq!(second.pks(), vec![pks[1].clone()]);
    assert_eq!(second.id_context(), 1);
    assert_eq!(second.flow().unwrap().executed_pks, vec![pks[0].clone()]);

    // skip the second key
    h.navigator.cancel(&edit, true).await.unwrap();
    let third = h.current();
    assert_eq!(third.pks(), vec![pks[2].clone()]);
    assert_eq!(third.flow().unwrap().executed_pks, vec![pks[0].clone()]);

    h.navigator
        .execute(&edit, third.pks(), &edit, None, None)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&h.current(), &list));
    assert_eq!(h.rest.call_count("save"), 2);
}

#[tokio::test]
async fn test_cancel_returns_to_previous_unless_refused() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    let display = h.open("balise", "display", vec![pk.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;
    let edit = h.action("balise", "edit");

    let refuse = Arc::new(AtomicBool::new(true));
    let flag = refuse.clone();
    h.registry.register_override(CANCEL_ACTION)(
        "balise",
        ACTION_COMPONENT,
        hook_fn(move |call| {
            assert_eq!(call.params.text("actionName"), "edit");
            HookOutcome::ready(HookValue::Bool(!flag.load(Ordering::SeqCst)))
        }),
        None,
    );

    h.navigator.cancel(&edit, false).await.unwrap();
    assert!(Arc::ptr_eq(&h.current(), &edit_screen));

    refuse.store(false, Ordering::SeqCst);
    h.navigator.cancel(&edit, false).await.unwrap();
    assert!(Arc::ptr_eq(&h.current(), &display));
}

// =============================================================================
// Links
// =============================================================================

#[tokio::test]
async fn test_attach_then_detach() {
    let h = Harness::new();
    let site = h.insert("site", json!({"id": 1, "name": "Brest"}));
    let b10 = h.insert("balise", json!({"id": 10}));
    let b11 = h.insert("balise", json!({"id": 11}));
    let link = h.link("site", "balises");

    let site_screen = h.open("site", "display", vec![site.clone()]).await;
    h.load().await;

    // selection screen for the attachment
    h.navigator
        .redirect_to_page_action(
            h.action("balise", "attach"),
            Redirect::default().options(ContextOptions::with_link(link.clone())),
        )
        .await
        .unwrap();
    let selection = h.current();
    assert_eq!(selection.action().name().front, "attach");
    assert_eq!(selection.options().link.unwrap().name().front, "balises");
    assert!(selection.get_path().contains("/site/balises"));

    // attaching from the selection screen runs in place
    h.navigator
        .redirect_to_page_action(
            h.action("balise", "attach"),
            Redirect::with_pks(vec![b10.clone(), b11.clone()])
                .options(ContextOptions::with_link(link.clone())),
        )
        .await
        .unwrap();
    assert_eq!(h.rest.linked("site", "balises", &site), vec![b10.clone(), b11.clone()]);
    assert!(Arc::ptr_eq(&h.current(), &site_screen));

    // detaching from the owner screen reloads it
    h.load().await;
    h.navigator
        .redirect_to_page_action(
            h.action("balise", "detach"),
            Redirect::with_pks(vec![b10]).options(ContextOptions::with_link(link)),
        )
        .await
        .unwrap();
    assert_eq!(h.rest.linked("site", "balises", &site), vec![b11]);
    assert!(Arc::ptr_eq(&h.current(), &site_screen));
    assert!(!site_screen.has_data());
}

#[tokio::test]
async fn test_link_action_needs_a_link() {
    let h = Harness::new();
    let site = h.insert("site", json!({"id": 1}));
    let b10 = h.insert("balise", json!({"id": 10}));
    h.open("site", "display", vec![site]).await;

    let err = h
        .navigator
        .redirect_to_page_action(h.action("balise", "detach"), Redirect::with_pks(vec![b10]))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MISSING_LINK");
}

// =============================================================================
// Callbacks and stale results
// =============================================================================

#[tokio::test]
async fn test_after_execute_picks_next_context() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    h.open("balise", "list", vec![]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;

    let store = h.store().clone();
    let display = h.action("balise", "display");
    let next_pk = pk.clone();
    edit_screen.set_functions(ContextFunctions::new().after_execute(move |data| {
        assert_eq!(data["primaryKey"], json!(next_pk.clone()));
        store
            .create_next(Some(display), vec![next_pk], None)
            .ok()
            .flatten()
    }));

    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, vec![pk.clone()], &edit, None, None)
        .await
        .unwrap();

    let current = h.current();
    assert_eq!(current.action().name().front, "display");
    assert_eq!(current.id_context(), 2);
    assert!(Arc::ptr_eq(&current.previous().unwrap(), &edit_screen));
}

#[tokio::test]
async fn test_execute_override_wraps_default() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    let display = h.open("balise", "display", vec![pk.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;

    let ran = Arc::new(AtomicBool::new(false));
    let seen = ran.clone();
    edit_screen.set_functions(ContextFunctions::new().on_execute(move |request| {
        async move {
            assert_eq!(request.action.name().front, "edit");
            let next = request.default.await?;
            seen.store(true, Ordering::SeqCst);
            Ok::<_, NavError>(next)
        }
        .boxed()
    }));

    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, vec![pk], &edit, None, None)
        .await
        .unwrap();
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(h.rest.call_count("save"), 1);
    assert!(Arc::ptr_eq(&h.current(), &display));
}

#[tokio::test]
async fn test_result_dropped_when_user_left() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    h.open("balise", "display", vec![pk.clone()]).await;
    let edit_screen = h.push("balise", "edit", vec![pk.clone()]).await;

    let called = Arc::new(AtomicBool::new(false));
    let flag = called.clone();
    let store = h.store().clone();
    edit_screen.set_functions(
        ContextFunctions::new()
            .on_execute(move |request| {
                async move {
                    // the user goes home while the call is in flight
                    store.go_home();
                    request.default.await
                }
                .boxed()
            })
            .after_execute(move |_| {
                flag.store(true, Ordering::SeqCst);
                None
            }),
    );

    let edit = h.action("balise", "edit");
    h.navigator
        .execute(&edit, vec![pk], &edit, None, None)
        .await
        .unwrap();

    assert_eq!(h.rest.call_count("save"), 1);
    assert!(!called.load(Ordering::SeqCst));
    assert!(h.store().current().is_none());
    assert_eq!(h.location.url(), "/");
}

// =============================================================================
// Menu
// =============================================================================

#[tokio::test]
async fn test_launch_menu_entries() {
    let h = Harness::new();
    let entries: Vec<MenuEntry> = serde_json::from_value(json!([
        {"display": "menu.BALISES", "id": "balises", "entity": "balise", "action": "list"},
        {"display": "menu.CARTE", "id": "carte", "href": "carte"}
    ]))
    .unwrap();

    h.navigator.launch_menu_entry(&entries[0]).await.unwrap();
    assert_eq!(h.current_screen(), ("balise".to_string(), "list".to_string()));

    h.navigator.launch_menu_entry(&entries[1]).await.unwrap();
    let custom = h.current();
    assert_eq!(custom.id_context(), 0);
    assert_eq!(custom.custom_path(), "carte");
    assert!(h.location.url().ends_with("carte"));
}

#[tokio::test]
async fn test_events_follow_navigation() {
    let h = Harness::new();
    let pk = h.insert("balise", json!({"id": 4}));
    let mut rx = h.store().events().subscribe();

    h.open("balise", "list", vec![]).await;
    h.push("balise", "display", vec![pk]).await;
    h.store().go_to_previous().unwrap();
    h.store().go_home();

    assert_eq!(
        drain_kinds(&mut rx),
        [
            "context_changed",
            "context_changed",
            "context_changed",
            "context_cleared"
        ]
    );
}
