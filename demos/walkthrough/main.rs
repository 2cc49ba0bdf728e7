//! Walkthrough of a navigation session against the in-memory backend
//!
//! Opens a list from the menu, creates a balise, lands on its display
//! screen through `next-action`, edits it and goes back.
//!
//! Run with `RUST_LOG=this_nav=debug` to follow the navigator.

use std::sync::Arc;
use this_nav::prelude::*;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("🧭 this-nav walkthrough\n");

    let model_path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/walkthrough/model.yaml");
    let config = ModelConfig::from_yaml_file(model_path)?;
    let model = Arc::new(EntityModel::from_config(&config));
    let backend = Arc::new(InMemoryRestGateway::new(model.clone()));
    backend.insert("balise", serde_json::json!({"id": 100, "name": "Ouessant"}))?;

    let navigator = NavigatorBuilder::new()
        .with_entity_model(model.clone())
        .with_security(Arc::new(AllowAll))
        .with_shared_rest_gateway(backend.clone())
        .build()?;
    let events = navigator.store().events().stream();

    let menu: Vec<MenuEntry> = serde_json::from_value(serde_json::json!([
        {"display": "menu.BALISES", "id": "balises", "entity": "balise", "action": "list"}
    ]))?;
    navigator.launch_menu_entry(&menu[0]).await?;
    let list = model.action("balise", "list")?;
    let rows = navigator.loader().load_data(&list, &[], None).await?;
    println!("📋 {} balise(s) listed", rows["resultSetCount"]);

    // create
    let create = model.action("balise", "create")?;
    navigator
        .redirect_to_page_action(create.clone(), Redirect::default())
        .await?;
    navigator
        .store()
        .require_current()?
        .set_data(Some(serde_json::json!({"name": "Sein"})));
    navigator.execute(&create, vec![], &create, None, None).await?;

    let display = navigator.store().require_current()?;
    let pk = display.pks().first().cloned().unwrap_or_default();
    println!("✅ Created {} and landed on {}", pk, display.get_path());

    // edit
    let edit = model.action("balise", "edit")?;
    navigator
        .redirect_to_page_action(edit.clone(), Redirect::with_pks(vec![pk.clone()]))
        .await?;
    let edit_action = navigator.store().require_current()?.action();
    navigator
        .loader()
        .load_data(&edit_action, &[pk.clone()], None)
        .await?;
    navigator
        .store()
        .require_current()?
        .update_data(|bean| bean["name"] = serde_json::json!("Île de Sein"));
    navigator
        .execute(&edit, vec![pk.clone()], &edit, None, None)
        .await?;
    if let Some(saved) = backend.get("balise", &pk) {
        println!("✏️  Saved {}", saved["name"]);
    }

    let breadcrumb: Vec<String> = navigator
        .store()
        .breadcrumb()
        .iter()
        .map(|frame| frame.action().name().front.clone())
        .collect();
    println!("🧱 Stack: {}", breadcrumb.join(" > "));

    navigator.store().go_home();
    drop(navigator);

    println!("\n📣 Events:");
    let events: Vec<EventEnvelope> = events.collect().await;
    for envelope in events {
        println!("   {} {}", envelope.timestamp.format("%H:%M:%S%.3f"), envelope.event.event_kind());
    }

    println!("\n📊 {} backend call(s)", backend.total_calls());
    Ok(())
}
