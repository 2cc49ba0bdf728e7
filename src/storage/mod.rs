//! Session storage, location and gateway backends
//!
//! The navigation store persists the context chain in a [`SessionStorage`]
//! and drives the browser-like [`Location`] of the UI shell. Both are
//! traits so that shells can plug their own; in-memory and file backed
//! implementations are provided here, along with the REST gateways.

pub mod file;
#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;

use crate::core::error::NavResult;
use url::Url;

pub use file::FileSessionStorage;
#[cfg(feature = "http")]
pub use http::HttpRestGateway;
pub use in_memory::{InMemoryRestGateway, MemoryLocation, MemorySessionStorage};

/// Key/value storage scoped to the user session
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> NavResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> NavResult<()>;

    fn remove(&self, key: &str) -> NavResult<()>;

    /// Remove every key
    fn clear(&self) -> NavResult<()>;
}

/// Navigable location of the UI shell
///
/// `url` is the path plus its query string, e.g. `/balise/list?c=0`.
pub trait Location: Send + Sync {
    fn url(&self) -> String;

    /// Navigate to `url`
    fn set_url(&self, url: &str);

    /// Re-run the current route without changing the url
    fn reload(&self);

    /// Path part of the url
    fn path(&self) -> String {
        let url = self.url();
        match url.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => url,
        }
    }

    /// Value of a query parameter of the url
    fn search(&self, param: &str) -> Option<String> {
        let url = Url::parse("http://localhost/")
            .and_then(|base| base.join(&self.url()))
            .ok()?;
        url.query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned())
    }
}
