// crates/flowcore/tests/store_test.rs

use flowcore::{ScopedStore, Value};

#[tokio::test]
async fn test_set_local_ignores_empty_key() {
    let store = ScopedStore::root("main");
    store.set_local("", Value::from("x")).await;
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_get_falls_back_to_ancestors() {
    let root = ScopedStore::root("main");
    let middle = ScopedStore::child("middle", &root);
    let inner = ScopedStore::child("inner", &middle);

    root.set_local("region", Value::from("eu")).await;
    middle.set_local("limit", Value::from(10i64)).await;

    assert_eq!(inner.get("region").await, Some(Value::from("eu")));
    assert_eq!(inner.get("limit").await, Some(Value::from(10i64)));
    assert_eq!(inner.get_local("region").await, None);
    assert_eq!(root.get("limit").await, None);
}

#[tokio::test]
async fn test_local_value_shadows_ancestor() {
    let root = ScopedStore::root("main");
    let child = ScopedStore::child("sub", &root);

    root.set_local("k", Value::from("outer")).await;
    child.set_local("k", Value::from("inner")).await;

    assert_eq!(child.get("k").await, Some(Value::from("inner")));
    assert_eq!(root.get("k").await, Some(Value::from("outer")));
}

#[tokio::test]
async fn test_set_global_qualifies_key_per_level() {
    let root = ScopedStore::root("main");
    let s1 = ScopedStore::child("s1", &root);
    let s2 = ScopedStore::child("s2", &s1);
    let s3 = ScopedStore::child("s3", &s2);

    s3.set_global("score", Value::from(0.5)).await;

    assert_eq!(s3.get("score").await, Some(Value::from(0.5)));
    assert_eq!(s2.get_local("s3-score").await, Some(Value::from(0.5)));
    assert_eq!(s1.get_local("s2-s3-score").await, Some(Value::from(0.5)));
    assert_eq!(root.get_local("s1-s2-s3-score").await, Some(Value::from(0.5)));

    // The short key stays in the scope that set it
    assert_eq!(root.get("score").await, None);
    assert_eq!(s2.get_local("score").await, None);
}

#[tokio::test]
async fn test_set_global_on_root_is_local() {
    let root = ScopedStore::root("main");
    root.set_global("k", Value::Bool(true)).await;
    assert_eq!(root.snapshot().await.len(), 1);
    assert!(!root.is_scoped());
}

#[tokio::test]
async fn test_dropped_parent_ends_the_chain() {
    let child = {
        let root = ScopedStore::root("main");
        root.set_local("k", Value::from("v")).await;
        ScopedStore::child("sub", &root)
    };
    assert!(child.parent().is_none());
    assert_eq!(child.get("k").await, None);
    child.set_global("x", Value::Null).await;
    assert!(child.contains_key("x").await);
}

#[tokio::test]
async fn test_concurrent_writers() {
    let store = ScopedStore::root("main");
    let mut handles = Vec::new();
    for i in 0..32i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.set_local(&format!("k{}", i), Value::from(i)).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.snapshot().await.len(), 32);
}
