use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use super::{CacheResult, ParamKey};

/// The result history of a single query, keyed by canonicalized parameter.
///
/// Besides the history, the entry tracks which key was written most recently, so that the latest
/// result can be retrieved without knowing its parameter.
pub struct CacheEntry<P, R> {
    history: HashMap<ParamKey, R>,
    /// Invariant: always present in `history` when set.
    last_key: Option<ParamKey>,
    _param: PhantomData<fn(&P)>,
}

impl<P, R> Default for CacheEntry<P, R> {
    fn default() -> Self {
        Self {
            history: HashMap::new(),
            last_key: None,
            _param: PhantomData,
        }
    }
}

impl<P, R> fmt::Debug for CacheEntry<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("entries", &self.history.len())
            .field("last_key", &self.last_key)
            .finish()
    }
}

impl<P: Serialize, R: Clone> CacheEntry<P, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the result for the given parameter.
    pub fn get(&self, param: &P) -> Result<CacheResult<R>, serde_json::Error> {
        let key = ParamKey::new(param)?;
        Ok(self.get_by_key(&key))
    }

    /// Looks up the result for an already canonicalized parameter.
    pub fn get_by_key(&self, key: &ParamKey) -> CacheResult<R> {
        self.history.get(key).cloned().into()
    }

    /// Stores `value` as the result for the given parameter.
    pub fn set(&mut self, param: &P, value: R) -> Result<(), serde_json::Error> {
        let key = ParamKey::new(param)?;
        self.insert(key, value);
        Ok(())
    }

    /// Stores `value` under an already canonicalized parameter, and marks it as the latest write.
    pub fn insert(&mut self, key: ParamKey, value: R) {
        self.history.insert(key.clone(), value);
        self.last_key = Some(key);
    }

    /// Returns the most recently written result.
    pub fn get_last(&self) -> CacheResult<R> {
        match &self.last_key {
            Some(key) => self.get_by_key(key),
            None => CacheResult::NOT_FOUND,
        }
    }

    /// The number of distinct parameters with a cached result.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
