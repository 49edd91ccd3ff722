//! Memoizing cache coordinator for asynchronous, parameterized queries.
//!
//! A [`Store`] owns named cache entries. Each entry is created together with a [`Query`], which
//! binds a mutable parameter ("body") to a resolver function. Results are cached per distinct
//! parameter value, and concurrent requests for a result are coalesced into a single resolver
//! invocation.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use querycache::Store;
//!
//! let store = Store::new();
//! let sum = store.create_query(
//!     "sum",
//!     |numbers: Vec<i64>| async move { Ok::<_, std::io::Error>(numbers.iter().sum::<i64>()) },
//!     vec![1, 2, 3],
//! )?;
//!
//! assert_eq!(sum.get_result(false).await?, 6);
//!
//! sum.set_body(vec![4, 5]);
//! assert_eq!(sum.get_result(false).await?, 9);
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod logging;
pub mod utils;

pub use caching::{
    CacheEntry, CacheResult, ParamKey, Query, QueryError, ResolutionResult, Store, StoreError,
};
