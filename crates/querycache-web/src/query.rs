use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use querycache::{CacheResult, Query, Store};
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::parse_headers;
use crate::{HttpMethod, WebError, WebQueryError};

/// The key of the single query registered in a [`WebQuery`]'s store.
const QUERY_KEY: &str = "default";

/// A decoded HTTP response.
///
/// Non-2xx responses are returned like any other response, inspect
/// [`status_code`](Self::status_code) to tell them apart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse<T> {
    pub body: T,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
}

impl<T> HttpResponse<T> {
    /// Returns `true` for `2xx` status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// The parameter of a [`WebQuery`], which is also its cache key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestParams<B> {
    pub uri: String,
    pub body: Option<B>,
}

/// A cached HTTP request.
///
/// Responses are cached per [`RequestParams`], so requesting a URI again returns the cached
/// response without sending a request. Change [`uri`](Self::uri) or [`body`](Self::body) to
/// request a different resource.
pub struct WebQuery<B, T> {
    pub uri: String,
    /// The request body, sent as JSON for methods that carry one.
    pub body: Option<B>,
    method: HttpMethod,
    store: Store,
    query: Query<RequestParams<B>, HttpResponse<T>, WebError>,
}

impl<B, T> std::fmt::Debug for WebQuery<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebQuery")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("query", &self.query)
            .finish()
    }
}

impl<B, T> WebQuery<B, T>
where
    B: Serialize + Clone + Send + Sync + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a query with a default client, no body and no extra headers.
    pub fn new(uri: impl Into<String>, method: HttpMethod) -> Result<Self, WebError> {
        Self::with_client(Client::new(), uri, method, None, &BTreeMap::new())
    }

    /// Creates a query sending requests through `client`, with `headers` added to every request.
    pub fn with_client(
        client: Client,
        uri: impl Into<String>,
        method: HttpMethod,
        body: Option<B>,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, WebError> {
        let uri = uri.into();
        let headers = Arc::new(parse_headers(headers)?);

        let resolver = move |params: RequestParams<B>| {
            let client = client.clone();
            let headers = Arc::clone(&headers);
            async move { send_request(&client, method, &headers, params).await }
        };

        let store = Store::new();
        let initial = RequestParams {
            uri: uri.clone(),
            body: body.clone(),
        };
        let query = store.create_query(QUERY_KEY, resolver, initial)?;

        Ok(Self {
            uri,
            body,
            method,
            store,
            query,
        })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns `true` while a request is outstanding.
    pub fn is_resolving(&self) -> bool {
        self.query.is_resolving()
    }

    /// Returns the response for the current [`uri`](Self::uri) and [`body`](Self::body).
    ///
    /// The current request parameters are captured when this is called, the returned future does
    /// not borrow the query.
    pub fn get_result(
        &self,
        force_refetch: bool,
    ) -> BoxFuture<'static, Result<HttpResponse<T>, WebQueryError>> {
        self.query.set_body(RequestParams {
            uri: self.uri.clone(),
            body: self.body.clone(),
        });

        let query = self.query.clone();
        async move { query.get_result(force_refetch).await }.boxed()
    }

    /// Returns the most recently received response, without sending a request.
    pub fn current(&self) -> Option<HttpResponse<T>> {
        self.store
            .get_current_value::<RequestParams<B>, HttpResponse<T>>(QUERY_KEY)
            .ok()
            .and_then(CacheResult::into_value)
    }

    /// Returns the cached response for `uri` and `body`, without sending a request.
    pub fn cached(&self, uri: &str, body: Option<&B>) -> Option<HttpResponse<T>> {
        let params = RequestParams {
            uri: uri.to_owned(),
            body: body.cloned(),
        };
        self.store
            .get_value::<RequestParams<B>, HttpResponse<T>>(QUERY_KEY, &params)
            .ok()
            .and_then(CacheResult::into_value)
    }
}

async fn send_request<B, T>(
    client: &Client,
    method: HttpMethod,
    headers: &HeaderMap,
    params: RequestParams<B>,
) -> Result<HttpResponse<T>, WebError>
where
    B: Serialize,
    T: DeserializeOwned,
{
    tracing::debug!(%method, uri = %params.uri, "Sending request");

    let mut request = client
        .request(method.into(), params.uri.as_str())
        .headers(headers.clone());
    if let Some(body) = params.body.as_ref().filter(|_| method.has_body()) {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status_code = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_owned())))
        .collect();

    let bytes = response.bytes().await?;
    let body = if bytes.is_empty() {
        serde_json::from_value(Value::Null)?
    } else {
        serde_json::from_slice(&bytes)?
    };

    tracing::trace!(%method, uri = %params.uri, status_code, "Received response");
    Ok(HttpResponse {
        body,
        status_code,
        headers,
    })
}
