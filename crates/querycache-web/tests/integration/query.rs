use querycache_test::{self as test, HitCounter};
use querycache_web::{HttpMethod, WebError, WebQuery};
use serde_json::{Value, json};

#[tokio::test]
async fn test_get_is_cached_per_uri() {
    test::setup();
    let server = HitCounter::new();

    let mut query = WebQuery::<(), Value>::new(server.url("/users/1"), HttpMethod::Get).unwrap();

    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body["data"]["email"], "user1@example.com");
    assert_eq!(response.headers["content-type"], "application/json");

    // served from the cache
    query.get_result(false).await.unwrap();
    assert_eq!(server.hits("/users/1"), 1);

    query.uri = server.url("/users/2");
    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.body["data"]["id"], 2);

    // switching back does not send another request
    query.uri = server.url("/users/1");
    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.body["data"]["id"], 1);

    assert_eq!(server.hits("/users/1"), 1);
    assert_eq!(server.hits("/users/2"), 1);
    assert_eq!(query.current().unwrap().body["data"]["id"], 2);
}

#[tokio::test]
async fn test_force_refetch_is_forwarded() {
    test::setup();
    let server = HitCounter::new();

    let query = WebQuery::<(), Value>::new(server.url("/users/3"), HttpMethod::Get).unwrap();

    query.get_result(false).await.unwrap();
    query.get_result(true).await.unwrap();
    query.get_result(false).await.unwrap();

    assert_eq!(server.hits("/users/3"), 2);
}

#[tokio::test]
async fn test_concurrent_requests_are_coalesced() {
    test::setup();
    let server = HitCounter::new();

    let query =
        WebQuery::<(), Value>::new(server.url("/delay/100ms/users/4"), HttpMethod::Get).unwrap();

    let responses = futures::future::join_all((0..5).map(|_| query.get_result(false))).await;
    for response in responses {
        assert_eq!(response.unwrap().body["data"]["id"], 4);
    }

    assert_eq!(server.hits("/delay/100ms/users/4"), 1);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    test::setup();
    let server = HitCounter::new();

    let mut query = WebQuery::<Value, Value>::new(server.url("/echo"), HttpMethod::Post).unwrap();

    query.body = Some(json!({"name": "morpheus"}));
    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.body, json!({"echo": {"name": "morpheus"}}));

    // a different body is a different cache entry
    query.body = Some(json!({"name": "trinity"}));
    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.body, json!({"echo": {"name": "trinity"}}));

    query.body = Some(json!({"name": "morpheus"}));
    query.get_result(false).await.unwrap();

    assert_eq!(server.hits("/echo"), 2);
    let cached = query.cached(&server.url("/echo"), Some(&json!({"name": "trinity"})));
    assert_eq!(cached.unwrap().body, json!({"echo": {"name": "trinity"}}));
}

#[tokio::test]
async fn test_delete_sends_no_body() {
    test::setup();
    let server = HitCounter::new();

    let mut query =
        WebQuery::<Value, Value>::new(server.url("/users/5"), HttpMethod::Delete).unwrap();
    query.body = Some(json!({"ignored": true}));

    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.body, json!({"deleted": 5}));
}

#[tokio::test]
async fn test_empty_bodies_decode_from_null() {
    test::setup();
    let server = HitCounter::new();

    let head = WebQuery::<(), Option<Value>>::new(server.url("/users/6"), HttpMethod::Head)
        .unwrap()
        .get_result(false)
        .await
        .unwrap();
    assert_eq!(head.status_code, 200);
    assert_eq!(head.body, None);

    let empty = WebQuery::<(), ()>::new(server.url("/empty"), HttpMethod::Get)
        .unwrap()
        .get_result(false)
        .await
        .unwrap();
    assert_eq!(empty.status_code, 204);
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    test::setup();
    let server = HitCounter::new();

    let query = WebQuery::<(), Value>::new(server.url("/status/404"), HttpMethod::Get).unwrap();

    let response = query.get_result(false).await.unwrap();
    assert_eq!(response.status_code, 404);
    assert!(!response.is_success());
    assert_eq!(response.body, json!({"status": 404}));
}

#[tokio::test]
async fn test_decode_error_is_not_cached() {
    test::setup();
    let server = HitCounter::new();

    let query = WebQuery::<(), u64>::new(server.url("/users/7"), HttpMethod::Get).unwrap();

    let err = query.get_result(false).await.unwrap_err();
    assert!(matches!(err.resolver_error(), Some(WebError::Decode(_))));

    query.get_result(false).await.unwrap_err();
    assert_eq!(server.hits("/users/7"), 2);
    assert!(query.current().is_none());
}

#[tokio::test]
async fn test_connection_error() {
    test::setup();

    let query = WebQuery::<(), Value>::new("http://127.0.0.1:1/users/1", HttpMethod::Get).unwrap();

    let err = query.get_result(false).await.unwrap_err();
    assert!(matches!(err.resolver_error(), Some(WebError::Request(_))));
    assert!(!query.is_resolving());
}
