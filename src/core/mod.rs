//! Core module containing the entity model, hooks and service contracts

pub mod action;
pub mod auth;
pub mod customization;
pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod hooks;
pub mod link;
pub mod model;
pub mod query;
pub mod service;

pub use action::{Action, ActionDefinition, Input, IoFlux, Persistence, Process, SubAction};
pub use auth::{AllowAll, SecurityFunction, SecurityService, SecurityTarget, SessionSecurity};
pub use customization::{
    ActionRedirect, CustomizationRegistry, HookCall, HookFn, HookOutcome, HookParams, HookValue,
    Rule, hook_fn, select_best,
};
pub use entity::{Entity, EntityDefinition, Name, PrimaryKey};
pub use error::{NavError, NavResult};
pub use events::{EventBus, EventEnvelope, MessageLevel, NavigationEvent, UserMessage};
pub use field::{FieldValue, KeyTag};
pub use link::{Link, LinkDefinition};
pub use model::EntityModel;
pub use query::{Query, QueryDefinition, QueryParams};
pub use service::{ActionTarget, ListResult, RestGateway, RestResponse};
