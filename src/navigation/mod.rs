//! Action execution, data loading and menus on top of the navigation store

pub mod builder;
pub mod load;
pub mod menu;
pub mod navigator;

pub use builder::NavigatorBuilder;
pub use load::LoadService;
pub use menu::{MENU_ENTITY, MenuEntry, add_custom_entries, filter_menu};
pub use navigator::{ExecutionStrategy, MENU_ACTION_NO_ELEMENT, Navigator, Redirect};
