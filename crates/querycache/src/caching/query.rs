use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use sentry::{Hub, SentryFutureExt};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::utils::futures::CallOnDrop;

use super::store::SharedEntry;
use super::{CacheResult, ParamKey, QueryError};

/// The outcome of a single resolver invocation, as observed by every caller awaiting it.
///
/// The error is wrapped in an [`Arc`] so it can be handed out to all coalesced callers.
pub type ResolutionResult<R, E> = Result<R, Arc<E>>;

// Inner result necessary because `futures::Shared` resolves to a `Canceled` error when the sender
// is dropped without sending.
type ResolutionChannel<R, E> = Shared<oneshot::Receiver<ResolutionResult<R, E>>>;

type BoxedResolver<P, R, E> = Box<dyn Fn(P) -> BoxFuture<'static, Result<R, E>> + Send + Sync>;

/// A resolution that is currently running.
struct InFlight<R, E> {
    /// Identifies the resolution, so that a finishing resolution only clears its own marker.
    generation: u64,
    channel: ResolutionChannel<R, E>,
}

struct QueryInner<P, R, E> {
    key: Arc<str>,
    body: Mutex<P>,
    resolver: BoxedResolver<P, R, E>,
    entry: SharedEntry<P, R>,
    /// Present exactly while the most recently started resolution is outstanding.
    in_flight: Mutex<Option<InFlight<R, E>>>,
    generations: AtomicU64,
}

impl<P, R, E> QueryInner<P, R, E> {
    /// Clears the in-flight marker, unless a newer resolution has replaced it in the meantime.
    fn finish_resolution(&self, generation: u64) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if in_flight
            .as_ref()
            .is_some_and(|running| running.generation == generation)
        {
            *in_flight = None;
        }
    }
}

/// A cached query, binding a mutable parameter ("body") to a resolver function.
///
/// Queries are created via [`Store::create_query`](super::Store::create_query) and are bound to
/// exactly one [`CacheEntry`](super::CacheEntry) of that store. Cloning a [`Query`] yields another
/// handle to the same query, sharing its body and in-flight resolution.
pub struct Query<P, R, E> {
    inner: Arc<QueryInner<P, R, E>>,
}

impl<P, R, E> Clone for Query<P, R, E> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R, E> fmt::Debug for Query<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolving = self
            .inner
            .in_flight
            .try_lock()
            .map(|in_flight| in_flight.is_some())
            .unwrap_or_default();
        f.debug_struct("Query")
            .field("key", &self.inner.key)
            .field("resolving", &resolving)
            .finish()
    }
}

impl<P, R, E> Query<P, R, E>
where
    P: Serialize + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(super) fn new<F, Fut>(key: String, resolver: F, body: P, entry: SharedEntry<P, R>) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let resolver: BoxedResolver<P, R, E> = Box::new(move |body| resolver(body).boxed());
        Self {
            inner: Arc::new(QueryInner {
                key: key.into(),
                body: Mutex::new(body),
                resolver,
                entry,
                in_flight: Mutex::new(None),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// The key this query is registered under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Returns a copy of the current body.
    pub fn body(&self) -> P {
        self.inner.body.lock().unwrap().clone()
    }

    /// Replaces the current body.
    ///
    /// This does not trigger a resolution by itself, it only affects the next call to
    /// [`get_result`](Self::get_result).
    pub fn set_body(&self, body: P) {
        *self.inner.body.lock().unwrap() = body;
    }

    /// Returns `true` while a resolution started by this query is outstanding.
    pub fn is_resolving(&self) -> bool {
        self.inner.in_flight.lock().unwrap().is_some()
    }

    /// Returns the result for the current body, resolving it only when necessary.
    ///
    /// - If a resolution is already in flight and `force_refetch` is `false`, this awaits that
    ///   resolution, even if the body was changed since it started.
    /// - Otherwise, the cached result for the current body is returned, if there is one.
    /// - Otherwise, or if `force_refetch` is `true`, the resolver is invoked with the current body.
    ///   Its result is cached under the body it was invoked with.
    ///
    /// The resolution is spawned onto the tokio runtime and runs to completion even if this
    /// future is dropped.
    ///
    /// # Errors
    ///
    /// Resolver failures are returned as [`QueryError::Resolver`] to every caller awaiting that
    /// resolution. Nothing is cached in that case.
    ///
    /// # Panics
    ///
    /// Panics when a resolution needs to be spawned outside of a tokio runtime. Cache hits and
    /// joined resolutions do not need a runtime.
    pub async fn get_result(&self, force_refetch: bool) -> Result<R, QueryError<E>> {
        let key = &*self.inner.key;
        metric!(counter("query.access") += 1, "query" => key);
        let runtime = Handle::try_current();

        let channel = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            match in_flight.as_ref() {
                Some(running) if !force_refetch => {
                    metric!(counter("query.channel.hit") += 1, "query" => key);
                    tracing::trace!(query = key, "Joining in-flight resolution");
                    running.channel.clone()
                }
                _ => {
                    let body = self.body();
                    let param_key = ParamKey::new(&body).map_err(QueryError::Parameter)?;

                    if force_refetch {
                        metric!(counter("query.forced") += 1, "query" => key);
                    } else if let CacheResult::Found(value) =
                        self.inner.entry.lock().unwrap().get_by_key(&param_key)
                    {
                        metric!(counter("query.cache.hit") += 1, "query" => key);
                        tracing::trace!(query = key, param = %param_key, "Cache hit");
                        return Ok(value);
                    }

                    let Ok(runtime) = runtime else {
                        // Release the lock first so the query stays usable after the panic.
                        drop(in_flight);
                        panic!("resolving query `{key}` requires a tokio runtime");
                    };

                    let running = self.spawn_resolution(&runtime, body, param_key);
                    let channel = running.channel.clone();
                    *in_flight = Some(running);
                    channel
                }
            }
        };

        match channel.await {
            Ok(result) => result.map_err(QueryError::Resolver),
            Err(_canceled) => Err(QueryError::Interrupted),
        }
    }

    /// Shorthand for `get_result(false)`.
    pub async fn result(&self) -> Result<R, QueryError<E>> {
        self.get_result(false).await
    }

    /// Shorthand for `get_result(true)`.
    pub async fn refetch(&self) -> Result<R, QueryError<E>> {
        self.get_result(true).await
    }

    /// Spawns a resolver invocation for `body` and returns its shareable channel.
    ///
    /// Must be called while holding the `in_flight` lock, and the returned marker must be stored
    /// before releasing it. The spawned task takes the same lock to clear the marker, so it can
    /// never do so before the marker was stored.
    fn spawn_resolution(&self, runtime: &Handle, body: P, param_key: ParamKey) -> InFlight<R, E> {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();

        let inner = Arc::clone(&self.inner);
        let finish_token = {
            let inner = Arc::clone(&self.inner);
            CallOnDrop::new(move || inner.finish_resolution(generation))
        };

        metric!(counter("query.computation") += 1, "query" => &*inner.key);
        tracing::debug!(query = &*inner.key, param = %param_key, generation, "Starting resolution");

        let resolution = async move {
            let key = &*inner.key;
            let started = Instant::now();
            let result = match (inner.resolver)(body).await {
                Ok(value) => {
                    inner
                        .entry
                        .lock()
                        .unwrap()
                        .insert(param_key, value.clone());
                    Ok(value)
                }
                Err(err) => {
                    metric!(counter("query.computation.error") += 1, "query" => key);
                    tracing::debug!(query = key, generation, "Resolution failed");
                    Err(Arc::new(err))
                }
            };
            metric!(timer("query.computation.duration") = started.elapsed(), "query" => key);

            // Drop the token first to clear the in-flight marker. This ensures that callers
            // either join a channel that will receive data, or find the freshly cached value.
            drop(finish_token);
            sender.send(result).ok();
        }
        .in_current_span()
        .bind_hub(Hub::new_from_top(Hub::current()));

        runtime.spawn(resolution);

        InFlight {
            generation,
            channel: receiver.shared(),
        }
    }
}
