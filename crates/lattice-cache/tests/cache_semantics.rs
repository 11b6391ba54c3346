//! Behavioral tests for cache policies and loading semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lattice_cache::{CachePolicy, CacheRegistry};
use lattice_core::CacheError;

#[tokio::test]
async fn size_cap_is_never_exceeded_after_housekeeping() {
    let registry = CacheRegistry::new();
    let handle = registry
        .register::<i64, String>("bounded", CachePolicy::new().with_max_entries(5))
        .unwrap();

    for i in 0..50 {
        handle.insert(i, format!("value-{i}")).await;
    }
    handle.run_pending_tasks().await;
    assert!(handle.entry_count() <= 5, "count = {}", handle.entry_count());
}

#[tokio::test]
async fn duplicate_insert_does_not_increase_count() {
    let registry = CacheRegistry::new();
    let handle = registry
        .register::<String, String>("dedup", CachePolicy::new().with_max_entries(10))
        .unwrap();

    handle.insert("k".into(), "one".into()).await;
    handle.insert("k".into(), "two".into()).await;
    handle.run_pending_tasks().await;

    assert_eq!(handle.entry_count(), 1);
    assert_eq!(handle.get(&"k".into()).await.as_deref(), Some("two"));
}

#[tokio::test]
async fn concurrent_misses_run_the_loader_exactly_once() {
    let registry = Arc::new(CacheRegistry::new());
    let invocations = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&invocations);
    let handle = registry
        .register_loading::<i64, String, _, _>(
            "reference",
            CachePolicy::new().with_max_entries(100),
            move |key| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    // Hold the in-flight slot long enough for every caller
                    // to pile up behind it.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(format!("loaded-{key}"))
                }
            },
        )
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.get_or_load(&7).await }));
    }

    for task in tasks {
        let value = task.await.unwrap().unwrap();
        assert_eq!(value, "loaded-7");
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loader_failures_are_shared_but_never_cached() {
    let registry = CacheRegistry::new();
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let handle = registry
        .register_loading::<String, String, _, _>(
            "flaky",
            CachePolicy::new(),
            move |key| {
                let counter = Arc::clone(&counter);
                async move {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt <= 2 {
                        anyhow::bail!("backend unavailable (attempt {attempt})");
                    }
                    Ok(format!("value-for-{key}"))
                }
            },
        )
        .unwrap();

    // First two calls fail with a Load error and nothing is cached.
    for _ in 0..2 {
        let err = handle.get_or_load(&"7".to_string()).await.unwrap_err();
        assert!(matches!(err, CacheError::Load { .. }), "got {err:?}");
        assert_eq!(handle.get(&"7".to_string()).await, None);
    }

    // Third call succeeds and the value sticks.
    let value = handle.get_or_load(&"7".to_string()).await.unwrap();
    assert_eq!(value, "value-for-7");
    assert_eq!(handle.get(&"7".to_string()).await.as_deref(), Some("value-for-7"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn loaded_values_are_visible_to_plain_get() {
    let registry = CacheRegistry::new();
    let handle = registry
        .register_loading::<i64, i64, _, _>("squares", CachePolicy::new(), |key| async move {
            Ok(key * key)
        })
        .unwrap();

    assert_eq!(handle.get(&9).await, None);
    assert_eq!(handle.get_or_load(&9).await.unwrap(), 81);
    assert_eq!(handle.get(&9).await, Some(81));
}
