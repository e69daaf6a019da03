// Adapter registry unit tests

use bossbar::cache::{new_cache, register, Cache, CacheError, MemoryCache, Registry};

#[test]
fn test_register_then_lookup() {
    let mut registry = Registry::new();
    registry.register("custom", MemoryCache::instance).unwrap();
    assert!(registry.contains("custom"));
    assert!(registry.lookup("custom").is_ok());
}

#[test]
fn test_duplicate_registration_keeps_first_factory() {
    let mut registry = Registry::with_builtin();
    let err = registry.register("redis", MemoryCache::instance).unwrap_err();
    assert!(matches!(err, CacheError::DuplicateAdapter(ref name) if name == "redis"));
    assert!(err.to_string().contains("twice"));
    assert_eq!(registry.names(), vec!["memory".to_string(), "redis".to_string()]);
}

#[test]
fn test_lookup_unknown_name() {
    let registry = Registry::new();
    assert!(matches!(
        registry.lookup("x"),
        Err(CacheError::UnknownAdapter(name)) if name == "x"
    ));
}

#[tokio::test]
async fn test_global_unknown_adapter_returns_error() {
    let result = new_cache("unknown", "{}").await;
    assert!(matches!(result, Err(CacheError::UnknownAdapter(_))));
}

#[tokio::test]
async fn test_global_register_custom_adapter() {
    register("registry_tests_memory", MemoryCache::instance).unwrap();
    assert!(register("registry_tests_memory", MemoryCache::instance).is_err());

    let cache: Box<dyn Cache> = new_cache("registry_tests_memory", r#"{"interval":"10"}"#)
        .await
        .unwrap();
    assert!(cache.setnx("k", b"v").await.unwrap());
    assert!(!cache.setnx("k", b"w").await.unwrap());
}

#[tokio::test]
async fn test_each_new_cache_is_independent() {
    let a = new_cache("memory", "{}").await.unwrap();
    let b = new_cache("memory", "{}").await.unwrap();
    a.incr("n").await.unwrap();
    assert!(!b.exists("n").await.unwrap());
}

#[tokio::test]
async fn test_start_error_propagates() {
    let result = new_cache("memory", r#"{"interval":"0"}"#).await;
    assert!(matches!(result, Err(CacheError::Configuration(_))));
}
