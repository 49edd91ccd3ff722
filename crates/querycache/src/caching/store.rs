use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::{CacheEntry, CacheResult, Query, StoreError};

/// A [`CacheEntry`] shared between the [`Store`] and the [`Query`] bound to it.
pub(super) type SharedEntry<P, R> = Arc<Mutex<CacheEntry<P, R>>>;

/// A type-erased [`SharedEntry`], so entries of different queries can live in the same map.
type ErasedEntry = Arc<dyn Any + Send + Sync>;

/// A registry of named query caches.
///
/// Every [`Query`] is created through [`Store::create_query`], which registers a new
/// [`CacheEntry`] under a unique key. The store can then be used to inspect cached results by key
/// without going through the query, see [`Store::get_value`] and [`Store::get_current_value`].
///
/// Cloning a [`Store`] is cheap and yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Store {
    entries: Arc<Mutex<HashMap<String, ErasedEntry>>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .entries
            .try_lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("Store").field("entries", &entries).finish()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new query under `key`.
    ///
    /// The `resolver` is not invoked until the first call to [`Query::get_result`].
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::KeyCollision`] if `key` is already registered. The existing
    /// registration is left untouched.
    pub fn create_query<P, R, E, F, Fut>(
        &self,
        key: impl Into<String>,
        resolver: F,
        initial_body: P,
    ) -> Result<Query<P, R, E>, StoreError>
    where
        P: Serialize + Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let key = key.into();
        let entry = SharedEntry::<P, R>::default();

        match self.entries.lock().unwrap().entry(key.clone()) {
            Entry::Occupied(_) => {
                metric!(counter("store.collision") += 1, "query" => &key);
                return Err(StoreError::KeyCollision(key));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry.clone());
            }
        }

        tracing::debug!(query = %key, "Registered query");
        Ok(Query::new(key, resolver, initial_body, entry))
    }

    /// Returns the cached result of query `key` for the given parameter.
    ///
    /// This never triggers a resolution.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::UnknownKey`] if `key` was never registered, and with
    /// [`StoreError::TypeMismatch`] if it was registered with other types.
    pub fn get_value<P, R>(&self, key: &str, param: &P) -> Result<CacheResult<R>, StoreError>
    where
        P: Serialize + 'static,
        R: Clone + Send + 'static,
    {
        let entry = self.entry::<P, R>(key)?;
        let result = entry.lock().unwrap().get(param)?;
        Ok(result)
    }

    /// Returns the most recently written result of query `key`.
    ///
    /// This never triggers a resolution.
    ///
    /// # Errors
    ///
    /// See [`Store::get_value`].
    pub fn get_current_value<P, R>(&self, key: &str) -> Result<CacheResult<R>, StoreError>
    where
        P: Serialize + 'static,
        R: Clone + Send + 'static,
    {
        let entry = self.entry::<P, R>(key)?;
        let result = entry.lock().unwrap().get_last();
        Ok(result)
    }

    /// Returns `true` if `key` is registered in this store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Returns all registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    /// The number of registered queries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry<P, R>(&self, key: &str) -> Result<SharedEntry<P, R>, StoreError>
    where
        P: 'static,
        R: Send + 'static,
    {
        let erased = self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownKey(key.to_owned()))?;

        erased
            .downcast::<Mutex<CacheEntry<P, R>>>()
            .map_err(|_| StoreError::TypeMismatch {
                key: key.to_owned(),
            })
    }
}
