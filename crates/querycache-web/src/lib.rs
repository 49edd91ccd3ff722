//! HTTP transport adapter for [`querycache`].
//!
//! A [`WebQuery`] caches HTTP responses per request URI and body. It owns a private
//! [`Store`](querycache::Store) with a single query, so concurrent requests for the same resource
//! are coalesced, and switching back to a previously requested URI is served from the cache.
//!
//! [`QueryBinding`] layers observable state on top of a [`WebQuery`], for renderers that want to
//! react to `loading` / `loaded_at_least_once` changes.

mod binding;
mod config;
mod error;
mod method;
mod query;

pub use binding::{BindingSettings, QueryBinding, QueryState};
pub use config::{HttpConfig, USER_AGENT};
pub use error::{WebError, WebQueryError};
pub use method::HttpMethod;
pub use query::{HttpResponse, RequestParams, WebQuery};
