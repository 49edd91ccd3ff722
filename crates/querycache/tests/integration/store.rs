use std::convert::Infallible;
use std::time::Duration;

use querycache::{CacheResult, Store, StoreError};
use querycache_test::{self as test, Counter};

#[tokio::test]
async fn test_store_scopes_queries() {
    test::setup();

    let store = Store::new();
    let count = Counter::new();

    let identity = store
        .create_query(
            "identityQuery",
            |body: String| async move { Ok::<_, Infallible>(body) },
            "A".to_owned(),
        )
        .unwrap();
    let counting = store
        .create_query(
            "countingQuery",
            {
                let count = count.clone();
                move |_body: ()| {
                    let value = count.next();
                    async move { Ok::<_, Infallible>(value) }
                }
            },
            (),
        )
        .unwrap();

    assert_eq!(identity.get_result(false).await.unwrap(), "A");
    assert_eq!(counting.get_result(false).await.unwrap(), 0);
    assert_eq!(counting.get_result(true).await.unwrap(), 1);

    // another store knows nothing about these keys
    let other = Store::new();
    assert!(matches!(
        other.get_current_value::<(), usize>("countingQuery"),
        Err(StoreError::UnknownKey(_))
    ));

    // but a clone of the store shares the registry
    let shared = store.clone();
    assert_eq!(
        shared.get_current_value::<(), usize>("countingQuery").unwrap(),
        CacheResult::Found(1)
    );
    assert!(matches!(
        shared.create_query(
            "identityQuery",
            |body: String| async move { Ok::<_, Infallible>(body) },
            "B".to_owned(),
        ),
        Err(StoreError::KeyCollision(_))
    ));
}

#[tokio::test]
async fn test_cloned_queries_share_state() {
    test::setup();

    let store = Store::new();
    let query = store
        .create_query(
            "sum",
            |numbers: Vec<i64>| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, Infallible>(numbers.iter().sum::<i64>())
            },
            vec![1, 2, 3],
        )
        .unwrap();
    let handle = query.clone();

    handle.set_body(vec![4, 5]);
    assert_eq!(query.body(), vec![4, 5]);
    assert_eq!(query.key(), "sum");
    assert_eq!(query.get_result(false).await.unwrap(), 9);

    assert_eq!(
        store.get_value::<Vec<i64>, i64>("sum", &vec![4, 5]).unwrap(),
        CacheResult::Found(9)
    );
    assert_eq!(
        store.get_value::<Vec<i64>, i64>("sum", &vec![1, 2, 3]).unwrap(),
        CacheResult::NotFound
    );
}

#[tokio::test]
async fn test_entry_outlives_query_handles() {
    test::setup();

    let store = Store::new();
    {
        let query = store
            .create_query(
                "ephemeral",
                |body: u8| async move { Ok::<_, Infallible>(body.count_ones()) },
                0b1011,
            )
            .unwrap();
        assert_eq!(query.get_result(false).await.unwrap(), 3);
    }

    assert_eq!(
        store.get_value::<u8, u32>("ephemeral", &0b1011).unwrap(),
        CacheResult::Found(3)
    );
    let collision = store.create_query(
        "ephemeral",
        |body: u8| async move { Ok::<_, Infallible>(body.count_ones()) },
        0,
    );
    assert!(collision.is_err());
}
