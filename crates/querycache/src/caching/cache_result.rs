/// The outcome of a cache lookup.
///
/// This distinguishes a value that was never computed from one that was computed, even if the
/// computed value is empty, zero or `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheResult<R> {
    /// A value was computed and cached.
    Found(R),
    /// Nothing was cached for the requested parameter.
    NotFound,
}

impl<R> CacheResult<R> {
    /// A shared "not found" result.
    pub const NOT_FOUND: Self = CacheResult::NotFound;

    pub fn is_found(&self) -> bool {
        matches!(self, CacheResult::Found(_))
    }

    /// Returns a reference to the cached value, if any.
    pub fn value(&self) -> Option<&R> {
        match self {
            CacheResult::Found(value) => Some(value),
            CacheResult::NotFound => None,
        }
    }

    pub fn into_value(self) -> Option<R> {
        match self {
            CacheResult::Found(value) => Some(value),
            CacheResult::NotFound => None,
        }
    }

    pub fn as_ref(&self) -> CacheResult<&R> {
        match self {
            CacheResult::Found(value) => CacheResult::Found(value),
            CacheResult::NotFound => CacheResult::NotFound,
        }
    }

    /// Maps the cached value, keeping the found/not-found distinction.
    pub fn map<U, F>(self, f: F) -> CacheResult<U>
    where
        F: FnOnce(R) -> U,
    {
        match self {
            CacheResult::Found(value) => CacheResult::Found(f(value)),
            CacheResult::NotFound => CacheResult::NotFound,
        }
    }
}

impl<R> Default for CacheResult<R> {
    fn default() -> Self {
        CacheResult::NotFound
    }
}

impl<R> From<Option<R>> for CacheResult<R> {
    fn from(value: Option<R>) -> Self {
        match value {
            Some(value) => CacheResult::Found(value),
            None => CacheResult::NotFound,
        }
    }
}

impl<R> From<CacheResult<R>> for Option<R> {
    fn from(result: CacheResult<R>) -> Self {
        result.into_value()
    }
}
