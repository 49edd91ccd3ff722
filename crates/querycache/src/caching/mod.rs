//! # Query caching infrastructure
//!
//! This module contains the cache/coordination engine: a registry of named cache entries
//! ([`Store`]), per-query handles that bind a mutable parameter to a resolver ([`Query`]), the
//! per-parameter result history of one query ([`CacheEntry`]) and an explicit found/absent result
//! wrapper ([`CacheResult`]).
//!
//! ## Registration
//!
//! Every query is registered in a [`Store`] under a unique string key via
//! [`Store::create_query`]. Registering a key twice fails with [`StoreError::KeyCollision`]. The
//! check and the insertion happen under a single lock, so concurrent registrations of the same key
//! resolve to exactly one winner. Keys are never removed, and an entry lives as long as its
//! [`Store`] (or any [`Query`] handle bound to it).
//!
//! The store itself is an explicitly constructed object. Applications can scope it per process,
//! per session, or per test.
//!
//! ## Parameter keys
//!
//! Results are cached per parameter value. Parameters are canonicalized into a [`ParamKey`]:
//! the value is serialized with `serde`, object fields are sorted recursively, and the resulting
//! text is hashed. Two structurally equal parameters always map to the same key, no matter how
//! they were constructed.
//!
//! ## Resolution
//!
//! [`Query::get_result`] decides whether a resolution is needed purely from the cache contents:
//! a resolver is invoked only if no value is cached for the current parameter, or if a refetch is
//! forced. There is no "dirty" flag, so switching back to a previously seen parameter is served
//! from the cache.
//!
//! Resolutions are spawned onto the tokio runtime and always run to completion. While a resolution
//! is in flight, every non-forced call to [`Query::get_result`] joins it instead of starting a new
//! one (single-flight). Joining is scoped to the whole [`Query`], not to the parameter being
//! resolved: a caller that changed the body while a resolution is running still observes the
//! outcome of that resolution.
//!
//! A failed resolution is reported to all joined callers as [`QueryError::Resolver`]. Nothing is
//! written to the cache in that case, and the next call retries.
//!
//! ### Metrics
//!
//! All metrics are tagged with the `query` key:
//!
//! - `query.access`: All calls to [`Query::get_result`].
//! - `query.cache.hit`: Calls served from the cache.
//! - `query.channel.hit`: Calls joining an in-flight resolution.
//! - `query.forced`: Calls forcing a refetch.
//! - `query.computation`: Resolver invocations.
//! - `query.computation.error`: Failed resolver invocations.
//! - `query.computation.duration`: Timer around each resolver invocation.
//! - `store.collision`: Rejected registrations.

mod cache_entry;
mod cache_result;
mod error;
mod param_key;
mod query;
mod store;

pub use cache_entry::CacheEntry;
pub use cache_result::CacheResult;
pub use error::{QueryError, StoreError};
pub use param_key::ParamKey;
pub use query::{Query, ResolutionResult};
pub use store::Store;
