//! Navigation contexts and the store owning them

pub mod component;
#[allow(clippy::module_inception)]
pub mod context;
pub mod snapshot;
pub mod store;

pub use component::{ComponentKeys, ComponentState, Placement};
pub use context::{
    AfterBackLoad, AfterExecute, ComponentStateBlob, Context, ContextFunctions, ContextOptions,
    DEFAULT_CONTEXT_PARAM, ExecuteOverride, ExecuteRequest, Flow, NextContextFuture, SharedFetch,
};
pub use snapshot::{ContextSnapshot, LinkReference, OptionsSnapshot};
pub use store::{NavigationStore, Ticket};
