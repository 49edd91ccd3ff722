use querycache_test::{self as test, HitCounter};
use querycache_web::{BindingSettings, HttpMethod, QueryBinding, WebError};
use serde_json::{Value, json};

#[tokio::test]
async fn test_fetches_on_uri_change() {
    test::setup();
    let server = HitCounter::new();

    let mut binding = QueryBinding::<(), Value>::new(BindingSettings::default());
    let initial = binding.state();
    assert!(!initial.loading);
    assert!(!initial.loaded_at_least_once);
    assert_eq!(initial.data, None);

    let handle = binding.set_uri(server.url("/users/1")).unwrap().unwrap();
    assert!(binding.state().loading);
    handle.await.unwrap();

    let state = binding.state();
    assert!(!state.loading);
    assert!(state.loaded_at_least_once);
    assert_eq!(state.status_code, Some(200));
    assert_eq!(state.data.unwrap()["data"]["id"], 1);

    let handle = binding.set_uri(server.url("/users/2")).unwrap().unwrap();
    handle.await.unwrap();
    assert_eq!(binding.state().data.unwrap()["data"]["id"], 2);

    // cached, so no new request
    let handle = binding.set_uri(server.url("/users/1")).unwrap().unwrap();
    handle.await.unwrap();
    assert_eq!(binding.state().data.unwrap()["data"]["id"], 1);
    assert_eq!(server.hits("/users/1"), 1);
}

#[tokio::test]
async fn test_lazy_binding() {
    test::setup();
    let server = HitCounter::new();

    let settings = BindingSettings {
        method: HttpMethod::Post,
        lazy: true,
        ..Default::default()
    };
    let mut binding = QueryBinding::<Value, Value>::new(settings);

    assert!(matches!(binding.fetch(), Err(WebError::MissingUri)));

    assert!(binding.set_uri(server.url("/echo")).unwrap().is_none());
    assert!(binding.set_body(Some(json!(42))).unwrap().is_none());
    assert_eq!(server.hits("/echo"), 0);

    binding.fetch().unwrap().await.unwrap();
    assert_eq!(binding.state().data, Some(json!({"echo": 42})));
    assert_eq!(binding.body(), Some(&json!(42)));
}

#[tokio::test]
async fn test_subscribe_and_errors() {
    test::setup();
    let server = HitCounter::new();

    let mut binding = QueryBinding::<(), u64>::new(BindingSettings::default());
    let mut receiver = binding.subscribe();

    binding
        .set_uri(server.url("/users/1"))
        .unwrap()
        .unwrap()
        .await
        .unwrap();

    assert!(receiver.has_changed().unwrap());
    let state = receiver.borrow_and_update().clone();
    assert!(!state.loading);
    assert!(!state.loaded_at_least_once);
    assert!(state.error.unwrap().starts_with("resolver failed"));
}
