use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{HttpMethod, WebError, WebQuery};

/// Settings of a [`QueryBinding`].
#[derive(Clone, Debug, Default)]
pub struct BindingSettings {
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    /// When set, changing the URI or body does not fetch automatically.
    pub lazy: bool,
}

/// The observable state of a [`QueryBinding`].
#[derive(Clone, Debug, PartialEq)]
pub struct QueryState<T> {
    /// The body of the last successful response.
    pub data: Option<T>,
    /// The status code of the last successful response.
    pub status_code: Option<u16>,
    /// `true` while at least one fetch is outstanding.
    pub loading: bool,
    pub loaded_at_least_once: bool,
    /// The error of the last fetch, cleared by the next successful one.
    pub error: Option<String>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            status_code: None,
            loading: false,
            loaded_at_least_once: false,
            error: None,
        }
    }
}

/// Binds a [`WebQuery`] to an observable [`QueryState`].
///
/// The underlying query is created on the first fetch, using the URI and body set at that time.
/// Unless [`BindingSettings::lazy`] is set, every change to the URI or body fetches immediately.
/// Renderers observe the state through [`subscribe`](Self::subscribe).
pub struct QueryBinding<B, T> {
    settings: BindingSettings,
    client: Client,
    uri: Option<String>,
    body: Option<B>,
    query: Option<WebQuery<B, T>>,
    state: Arc<watch::Sender<QueryState<T>>>,
    pending: Arc<AtomicUsize>,
}

impl<B, T> QueryBinding<B, T>
where
    B: Serialize + Clone + Send + Sync + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(settings: BindingSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: BindingSettings) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            settings,
            client,
            uri: None,
            body: None,
            query: None,
            state: Arc::new(state),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    /// Sets the URI, and fetches it unless the binding is lazy.
    ///
    /// Returns the handle of the started fetch, if any.
    pub fn set_uri(&mut self, uri: impl Into<String>) -> Result<Option<JoinHandle<()>>, WebError> {
        self.uri = Some(uri.into());
        self.fetch_eagerly()
    }

    /// Sets the request body, and fetches unless the binding is lazy or has no URI yet.
    pub fn set_body(&mut self, body: Option<B>) -> Result<Option<JoinHandle<()>>, WebError> {
        self.body = body;
        match self.uri {
            Some(_) => self.fetch_eagerly(),
            None => Ok(None),
        }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    /// Returns a receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Fetches the current URI and body in the background.
    ///
    /// `loading` is set before this returns. Awaiting the returned handle waits until the state
    /// reflects the outcome of this fetch.
    ///
    /// # Errors
    ///
    /// Fails with [`WebError::MissingUri`] if no URI was set yet.
    pub fn fetch(&mut self) -> Result<JoinHandle<()>, WebError> {
        let uri = self.uri.clone().ok_or(WebError::MissingUri)?;

        let mut query = match self.query.take() {
            Some(query) => query,
            None => WebQuery::with_client(
                self.client.clone(),
                uri.clone(),
                self.settings.method,
                self.body.clone(),
                &self.settings.headers,
            )?,
        };
        query.uri = uri;
        query.body = self.body.clone();
        let result = query.get_result(false);
        self.query = Some(query);

        self.pending.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| state.loading = true);

        let state = Arc::clone(&self.state);
        let pending = Arc::clone(&self.pending);
        Ok(tokio::spawn(async move {
            let result = result.await;
            let remaining = pending.fetch_sub(1, Ordering::SeqCst) - 1;

            state.send_modify(|state| {
                state.loading = remaining > 0;
                match result {
                    Ok(response) => {
                        state.data = Some(response.body);
                        state.status_code = Some(response.status_code);
                        state.loaded_at_least_once = true;
                        state.error = None;
                    }
                    Err(err) => {
                        tracing::debug!(
                            error = &err as &dyn std::error::Error,
                            "Failed to fetch query"
                        );
                        state.error = Some(err.to_string());
                    }
                }
            });
        }))
    }

    fn fetch_eagerly(&mut self) -> Result<Option<JoinHandle<()>>, WebError> {
        if self.settings.lazy {
            return Ok(None);
        }
        self.fetch().map(Some)
    }
}
