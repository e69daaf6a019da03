// Cache facade unit tests
// Covers fast-fail, panic demotion and the circuit breaker

use async_trait::async_trait;
use bossbar::cache::{Cache, CacheClient, CacheError, CacheMetrics, MemoryCache, Outcome, SetOptions};
use bossbar::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy)]
enum Mode {
    Panic,
    Unreachable,
}

/// Adapter that fails every call, either by panicking or with a
/// connectivity error. Counts how often it was reached.
struct ScriptedCache {
    mode: Mode,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCache {
    fn new(mode: Mode) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                mode,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Panic => panic!("adapter bug"),
            Mode::Unreachable => Err(CacheError::Connection("connection refused".to_string())),
        }
    }
}

#[async_trait]
impl Cache for ScriptedCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.fail()
    }
    async fn get_multi(&self, _keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        self.fail()
    }
    async fn set(&self, _key: &str, _value: &[u8], _options: SetOptions) -> Result<(), CacheError> {
        self.fail()
    }
    async fn put(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        self.fail()
    }
    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        self.fail()
    }
    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn expire(&self, _key: &str, _seconds: i64) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn incr(&self, _key: &str) -> Result<i64, CacheError> {
        self.fail()
    }
    async fn incr_by(&self, _key: &str, _increment: i64) -> Result<i64, CacheError> {
        self.fail()
    }
    async fn decr(&self, _key: &str) -> Result<i64, CacheError> {
        self.fail()
    }
    async fn decr_by(&self, _key: &str, _decrement: i64) -> Result<i64, CacheError> {
        self.fail()
    }
    async fn setnx(&self, _key: &str, _value: &[u8]) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn sadd(&self, _key: &str, _members: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn spop(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.fail()
    }
    async fn sismember(&self, _key: &str, _member: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn smembers(&self, _key: &str) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn sdiff(&self, _keys: &[&str]) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn smove(&self, _source: &str, _destination: &str, _member: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn srem(&self, _key: &str, _members: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn sunion(&self, _keys: &[&str]) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn zadd(&self, _key: &str, _pairs: &HashMap<String, f64>) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn zscore(&self, _key: &str, _member: &str) -> Result<Option<f64>, CacheError> {
        self.fail()
    }
    async fn zrange(&self, _key: &str, _start: isize, _stop: isize, _with_scores: bool) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn zrange_by_score(&self, _key: &str, _min: f64, _max: f64, _with_scores: bool) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn zrevrange(&self, _key: &str, _start: isize, _stop: isize, _with_scores: bool) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn zrem(&self, _key: &str, _members: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn zincrby(&self, _key: &str, _member: &str, _increment: f64) -> Result<f64, CacheError> {
        self.fail()
    }
    async fn zrem_range_by_rank(&self, _key: &str, _start: isize, _stop: isize) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn zrem_range_by_score(&self, _key: &str, _min: f64, _max: f64) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn hget(&self, _key: &str, _field: &str) -> Result<Option<String>, CacheError> {
        self.fail()
    }
    async fn hset(&self, _key: &str, _field: &str, _value: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn hincrby(&self, _key: &str, _field: &str, _increment: i64) -> Result<i64, CacheError> {
        self.fail()
    }
    async fn hexists(&self, _key: &str, _field: &str) -> Result<bool, CacheError> {
        self.fail()
    }
    async fn hmget(&self, _key: &str, _fields: &[&str]) -> Result<Vec<Option<String>>, CacheError> {
        self.fail()
    }
    async fn hmset(&self, _key: &str, _pairs: &[(&str, &str)]) -> Result<(), CacheError> {
        self.fail()
    }
    async fn hvals(&self, _key: &str) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn hgetall(&self, _key: &str) -> Result<HashMap<String, String>, CacheError> {
        self.fail()
    }
    async fn hdel(&self, _key: &str, _fields: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn rpush(&self, _key: &str, _values: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn lpush(&self, _key: &str, _values: &[&str]) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn lpop(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.fail()
    }
    async fn blpop(&self, _key: &str, _timeout_secs: u64) -> Result<Option<String>, CacheError> {
        self.fail()
    }
    async fn lrem(&self, _key: &str, _count: isize, _value: &str) -> Result<usize, CacheError> {
        self.fail()
    }
    async fn lrange(&self, _key: &str, _start: isize, _stop: isize) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
    async fn clear_all(&self) -> Result<(), CacheError> {
        self.fail()
    }
    async fn start_and_gc(&mut self, _config: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

fn breaker_config(failure_threshold: u32, timeout: Duration) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        success_threshold: 1,
        timeout_duration: timeout,
        half_open_max_requests: 1,
    }
}

#[tokio::test]
async fn test_panic_demotes_facade_to_unconfigured() {
    let (adapter, calls) = ScriptedCache::new(Mode::Panic);
    let client = CacheClient::from_adapter(Box::new(adapter), CircuitBreakerConfig::default());
    assert!(client.is_configured());

    match client.incr("counter").await {
        Err(CacheError::AdapterFault(msg)) => assert!(msg.contains("adapter bug")),
        other => panic!("Expected AdapterFault, got {:?}", other),
    }
    assert!(!client.is_configured());
    assert_eq!(client.breaker_state(), CircuitState::Tripped);

    // every later call fails fast without reaching the adapter
    assert!(matches!(client.incr("counter").await, Err(CacheError::NotConfigured)));
    assert!(matches!(client.hget("h", "f").await, Err(CacheError::NotConfigured)));
    assert!(matches!(client.clear_all().await, Err(CacheError::NotConfigured)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panic_fault_is_counted() {
    let metrics = CacheMetrics::global().expect("metrics registered");
    let before = metrics.count("zincrby", Outcome::Fault);

    let (adapter, _) = ScriptedCache::new(Mode::Panic);
    let client = CacheClient::from_adapter(Box::new(adapter), CircuitBreakerConfig::default());
    let _ = client.zincrby("z", "m", 1.0).await;

    assert_eq!(metrics.count("zincrby", Outcome::Fault), before + 1);
}

#[tokio::test]
async fn test_concurrent_panics_all_demote_safely() {
    let (adapter, _) = ScriptedCache::new(Mode::Panic);
    let client = Arc::new(CacheClient::from_adapter(
        Box::new(adapter),
        CircuitBreakerConfig::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.exists(&format!("key-{}", i)).await
        }));
    }
    for handle in handles {
        let result = handle.await.expect("task must not propagate the panic");
        assert!(matches!(
            result,
            Err(CacheError::AdapterFault(_))
                | Err(CacheError::NotConfigured)
                | Err(CacheError::CircuitOpen)
        ));
    }
    assert!(!client.is_configured());
}

#[tokio::test]
async fn test_connectivity_errors_open_the_circuit() {
    let (adapter, calls) = ScriptedCache::new(Mode::Unreachable);
    let client = CacheClient::from_adapter(
        Box::new(adapter),
        breaker_config(3, Duration::from_secs(60)),
    );

    for _ in 0..3 {
        assert!(matches!(client.get_raw("k").await, Err(CacheError::Connection(_))));
    }
    assert_eq!(client.breaker_state(), CircuitState::Open);

    assert!(matches!(client.get_raw("k").await, Err(CacheError::CircuitOpen)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // the adapter stays installed; only the breaker is rejecting
    assert!(client.is_configured());
}

#[tokio::test]
async fn test_open_circuit_half_opens_after_timeout() {
    let (adapter, calls) = ScriptedCache::new(Mode::Unreachable);
    let client = CacheClient::from_adapter(
        Box::new(adapter),
        breaker_config(1, Duration::from_millis(50)),
    );

    let _ = client.exists("k").await;
    assert_eq!(client.breaker_state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(80)).await;
    // the trial call reaches the adapter, fails, and reopens the circuit
    assert!(matches!(client.exists("k").await, Err(CacheError::Connection(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.breaker_state(), CircuitState::Open);
}

#[tokio::test]
async fn test_expire_and_is_exist_swallow_errors() {
    let (adapter, _) = ScriptedCache::new(Mode::Unreachable);
    let client = CacheClient::from_adapter(
        Box::new(adapter),
        breaker_config(100, Duration::from_secs(60)),
    );
    assert!(!client.expire("k", 10).await);
    assert!(!client.is_exist("k").await);
}

#[tokio::test]
async fn test_out_of_range_expiry_keeps_facade_installed() {
    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());
    client.set_raw("k", b"v", SetOptions::default()).await.unwrap();

    assert!(!client.expire("k", i64::MAX).await);
    assert!(matches!(
        client.set("big", &1u32, u64::MAX).await,
        Err(CacheError::Command(_))
    ));

    assert!(client.is_configured());
    assert_eq!(client.breaker_state(), CircuitState::Closed);
    assert_eq!(client.incr("n").await.unwrap(), 1);
    assert!(client.is_exist("k").await);
}

#[tokio::test]
async fn test_install_recovers_from_fault() {
    let (adapter, _) = ScriptedCache::new(Mode::Panic);
    let client = CacheClient::from_adapter(Box::new(adapter), CircuitBreakerConfig::default());
    let _ = client.lpop("queue").await;
    assert_eq!(client.breaker_state(), CircuitState::Tripped);

    client.install(Box::new(MemoryCache::new()));
    assert_eq!(client.breaker_state(), CircuitState::Closed);
    assert_eq!(client.rpush("queue", &["a"]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_facade_mirrors_adapter_operations() {
    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());

    assert_eq!(client.incr_by("n", 5).await.unwrap(), 5);
    assert_eq!(client.decr_by("n", 3).await.unwrap(), 2);

    assert_eq!(client.sadd("s", &["a", "b"]).await.unwrap(), 2);
    let mut members = client.smembers("s").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
    assert!(client.smove("s", "t", "a").await.unwrap());
    assert_eq!(client.sunion(&["s", "t"]).await.unwrap().len(), 2);

    let pairs = HashMap::from([("m1".to_string(), 1.0), ("m2".to_string(), 2.0)]);
    assert_eq!(client.zadd("z", &pairs).await.unwrap(), 2);
    assert_eq!(client.zrange("z", 0, -1, false).await.unwrap(), vec!["m1", "m2"]);
    assert_eq!(client.zrevrange("z", 0, 0, true).await.unwrap(), vec!["m2", "2"]);

    client.hmset("h", &[("a", "1"), ("b", "2")]).await.unwrap();
    assert_eq!(client.hincrby("h", "a", 10).await.unwrap(), 11);
    assert_eq!(
        client.hmget("h", &["a", "zz"]).await.unwrap(),
        vec![Some("11".to_string()), None]
    );

    assert_eq!(client.blpop("empty", 1).await.unwrap(), None);

    client.clear_all().await.unwrap();
    assert!(!client.exists("h").await.unwrap());
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

#[tokio::test]
async fn test_typed_values_round_trip_through_codec() {
    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());
    let session = Session {
        user_id: 42,
        roles: vec!["admin".to_string()],
    };

    client.set("session:42", &session, 60).await.unwrap();
    let loaded: Option<Session> = client.get("session:42").await.unwrap();
    assert_eq!(loaded, Some(session));

    let missing: Option<Session> = client.get("session:43").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_decoding_foreign_bytes_is_serialization_error() {
    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());
    client
        .set_raw("plain", b"not an envelope", SetOptions::default())
        .await
        .unwrap();

    let result: Result<Option<Session>, _> = client.get("plain").await;
    assert!(matches!(result, Err(CacheError::Serialization(_))));
    // decode failures are not the store's fault
    assert_eq!(client.breaker_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_get_pure_and_set_nx_ex() {
    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());

    assert!(matches!(client.get_pure("lock").await, Err(CacheError::NotFound(_))));
    client.set_nx_ex("lock", b"owner-1", 30).await.unwrap();
    assert!(matches!(
        client.set_nx_ex("lock", b"owner-2", 30).await,
        Err(CacheError::ConditionNotMet)
    ));
    assert_eq!(client.get_pure("lock").await.unwrap(), "owner-1");
}

#[tokio::test]
async fn test_cache_misses_are_counted() {
    let metrics = CacheMetrics::global().expect("metrics registered");
    let before = metrics.count("get_raw", Outcome::Miss);

    let client = CacheClient::from_adapter(Box::new(MemoryCache::new()), CircuitBreakerConfig::default());
    assert_eq!(client.get_raw("facade_tests_missing").await.unwrap(), None);

    assert!(metrics.count("get_raw", Outcome::Miss) > before);
}

#[tokio::test]
async fn test_disabled_client_rejects_everything() {
    let client = CacheClient::disabled();
    assert!(matches!(client.set("k", &1u32, 0).await, Err(CacheError::NotConfigured)));
    assert!(matches!(client.get::<u32>("k").await, Err(CacheError::NotConfigured)));
    assert!(!client.is_exist("k").await);
}
