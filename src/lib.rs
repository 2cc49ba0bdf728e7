//! # this-nav
//!
//! Metadata-driven navigation for entity screens.
//!
//! Screens (lists, forms, link pickers) are described by a declarative
//! entity model instead of being written one by one. This crate owns the
//! part every such UI shell needs and none of them should rewrite:
//!
//! - **Context stack**: one [`Context`](context::Context) per navigated
//!   screen, binding an action to its target keys, cached linked data and
//!   per-component UI state, persisted across reloads
//! - **Action state machine**: validation, redirection, execution through a
//!   [`RestGateway`](core::RestGateway) and resolution of the next screen
//! - **Customization registry**: named hooks resolved by entity, component
//!   type and criteria, the most specific override winning
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_nav::prelude::*;
//!
//! let navigator = NavigatorBuilder::new()
//!     .with_model(ModelConfig::from_yaml_file("model.yaml")?)
//!     .with_config(NavigatorConfig {
//!         backend_url: Some("http://localhost:8080/rest/".into()),
//!         ..Default::default()
//!     })
//!     .build()?;
//!
//! let list = navigator.store().model().action("balise", "list")?;
//! navigator
//!     .redirect_to_page_action(list.clone(), Redirect::default().from_menu())
//!     .await?;
//! let rows = navigator.loader().load_data(&list, &[], None).await?;
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod navigation;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Model ===
    pub use crate::core::{
        action::{Action, ActionDefinition, Input, IoFlux, Persistence, Process, SubAction},
        entity::{Entity, EntityDefinition, Name, PrimaryKey},
        field::{FieldValue, KeyTag},
        link::{Link, LinkDefinition},
        model::EntityModel,
        query::{Query, QueryParams},
    };

    // === Hooks ===
    pub use crate::core::customization::{
        ActionRedirect, CustomizationRegistry, HookCall, HookOutcome, HookParams, HookValue,
        criteria, hook_fn,
    };
    pub use crate::core::hooks::register_defaults;

    // === Services ===
    pub use crate::core::{
        auth::{AllowAll, SecurityService, SecurityTarget, SessionSecurity},
        error::{NavError, NavResult},
        events::{EventBus, EventEnvelope, MessageLevel, NavigationEvent, UserMessage},
        service::{ActionTarget, ListResult, RestGateway, RestResponse},
    };

    // === Navigation ===
    pub use crate::context::{
        ComponentState, Context, ContextFunctions, ContextOptions, ContextSnapshot,
        NavigationStore,
    };
    pub use crate::navigation::{
        ExecutionStrategy, LoadService, MenuEntry, Navigator, NavigatorBuilder, Redirect,
        add_custom_entries, filter_menu,
    };

    // === Storage ===
    #[cfg(feature = "http")]
    pub use crate::storage::HttpRestGateway;
    pub use crate::storage::{
        FileSessionStorage, InMemoryRestGateway, Location, MemoryLocation, MemorySessionStorage,
        SessionStorage,
    };

    // === Config ===
    pub use crate::config::{ModelConfig, NavigatorConfig};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
