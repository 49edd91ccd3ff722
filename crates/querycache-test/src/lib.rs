//! Helpers for testing the query cache and its HTTP adapter.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`HitCounter`], make sure that the server is held until all requests to it have
//!    been made. If the server is dropped, it stops serving and all connections to it will fail.
//!    To avoid this, assign it to a variable: `let server = HitCounter::new();`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `querycache` crates and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("querycache=trace,querycache_web=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A shared counter to observe how often a resolver was invoked.
///
/// Clones share the same count.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count and increments it.
    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the current count.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl Server {
    /// Serves the given router on a random local port.
    pub fn with_router(router: Router) -> Self {
        let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Hits = Arc<Mutex<BTreeMap<String, usize>>>;

/// A mock JSON API that counts the requests made to each path.
///
/// Routes:
///
///  - `GET|HEAD /users/:id`: a user object, `{"data": {"id": .., "email": .., ..}}`.
///  - `DELETE /users/:id`: `{"deleted": id}`.
///  - `POST|PUT|PATCH /echo`: `{"echo": <request body>}`.
///  - `GET /delay/:time/users/:id`: the user object after sleeping for `time` (e.g. `100ms`).
///  - `GET /status/:code`: responds with the given status code and `{"status": code}`.
///  - `GET /empty`: an empty `204 No Content` response.
pub struct HitCounter {
    server: Server,
    hits: Hits,
}

impl HitCounter {
    pub fn new() -> Self {
        let hits = Hits::default();

        let router = Router::new()
            .route("/users/:id", get(user).delete(delete_user))
            .route("/echo", post(echo).put(echo).patch(echo))
            .route("/delay/:time/users/:id", get(delayed_user))
            .route("/status/:code", get(status))
            .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
            .layer(middleware::from_fn_with_state(hits.clone(), count_hits));

        Self {
            server: Server::with_router(router),
            hits,
        }
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        self.server.url(path)
    }

    /// Returns the number of requests made to `path`, with any method.
    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    /// Returns the request counts of all paths.
    pub fn accesses(&self) -> BTreeMap<String, usize> {
        self.hits.lock().unwrap().clone()
    }
}

impl Default for HitCounter {
    fn default() -> Self {
        Self::new()
    }
}

async fn count_hits(State(hits): State<Hits>, request: Request, next: Next) -> Response {
    {
        let mut hits = hits.lock().unwrap();
        *hits.entry(request.uri().path().to_owned()).or_default() += 1;
    }

    next.run(request).await
}

fn user_json(id: u32) -> Json<Value> {
    Json(json!({
        "data": {
            "id": id,
            "email": format!("user{id}@example.com"),
            "first_name": "Test",
            "last_name": format!("User {id}"),
        },
    }))
}

async fn user(Path(id): Path<u32>) -> Json<Value> {
    user_json(id)
}

async fn delete_user(Path(id): Path<u32>) -> Json<Value> {
    Json(json!({ "deleted": id }))
}

async fn delayed_user(Path((time, id)): Path<(String, u32)>) -> Json<Value> {
    let duration = humantime::parse_duration(&time).unwrap();
    tokio::time::sleep(duration).await;
    user_json(id)
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "echo": body }))
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "status": code }))).into_response()
}
