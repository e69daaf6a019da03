// Memory adapter behavior tests
// Exercises the Cache contract through a boxed trait object

use bossbar::cache::{new_cache, Cache, CacheError, SetOptions};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

async fn cache() -> Box<dyn Cache> {
    new_cache("memory", r#"{"interval":"1"}"#).await.unwrap()
}

#[tokio::test]
async fn test_set_get_delete() {
    let cache = cache().await;
    cache.set("k", b"hello", SetOptions::default()).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(b"hello".to_vec()));
    assert!(cache.exists("k").await.unwrap());

    cache.delete("k").await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), None);
    // deleting again is fine
    cache.delete("k").await.unwrap();
}

#[tokio::test]
async fn test_put_with_ttl_expires() {
    let cache = cache().await;
    cache.put("session", b"v", Duration::from_millis(50)).await.unwrap();
    assert!(cache.is_exist("session").await);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(cache.get("session").await.unwrap(), None);
    assert!(!cache.is_exist("session").await);
}

#[tokio::test]
async fn test_set_nx_twice() {
    let cache = cache().await;
    let options = SetOptions::default().must_not_exist().expire_secs(60);
    cache.set("lock", b"a", options).await.unwrap();
    let second = cache.set("lock", b"b", options).await;
    assert!(matches!(second, Err(CacheError::ConditionNotMet)));
    assert_eq!(cache.get("lock").await.unwrap(), Some(b"a".to_vec()));
}

#[tokio::test]
async fn test_set_xx_requires_existing_key() {
    let cache = cache().await;
    let options = SetOptions::default().must_exist();
    assert!(matches!(
        cache.set("k", b"v", options).await,
        Err(CacheError::ConditionNotMet)
    ));
    cache.set("k", b"v", SetOptions::default()).await.unwrap();
    cache.set("k", b"w", options).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap(), Some(b"w".to_vec()));
}

#[tokio::test]
async fn test_expire_existing_and_missing() {
    let cache = cache().await;
    assert!(!cache.expire("missing", 10).await.unwrap());
    cache.set("k", b"v", SetOptions::default()).await.unwrap();
    assert!(cache.expire("k", 10).await.unwrap());
}

#[tokio::test]
async fn test_get_multi_lines_up_with_keys() {
    let cache = cache().await;
    cache.set("a", b"1", SetOptions::default()).await.unwrap();
    cache.set("c", b"3", SetOptions::default()).await.unwrap();
    let values = cache.get_multi(&["a", "b", "c"]).await.unwrap();
    assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
    assert!(cache.get_multi(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_counters() {
    let cache = cache().await;
    assert_eq!(cache.incr("n").await.unwrap(), 1);
    assert_eq!(cache.incr_by("n", 9).await.unwrap(), 10);
    assert_eq!(cache.decr("n").await.unwrap(), 9);
    assert_eq!(cache.decr_by("n", 20).await.unwrap(), -11);
    assert_eq!(cache.get("n").await.unwrap(), Some(b"-11".to_vec()));
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let cache: Arc<Box<dyn Cache>> = Arc::new(cache().await);
    let tasks = 8;
    let per_task = 250;

    let mut handles = Vec::new();
    for _ in 0..tasks {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for _ in 0..per_task {
                cache.incr("hits").await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(cache.incr_by("hits", 0).await.unwrap(), tasks * per_task);
}

#[tokio::test]
async fn test_clear_all_empties_the_cache() {
    let cache = cache().await;
    cache.set("a", b"1", SetOptions::default()).await.unwrap();
    cache.sadd("s", &["x"]).await.unwrap();
    cache.rpush("l", &["x"]).await.unwrap();

    cache.clear_all().await.unwrap();
    for key in ["a", "s", "l"] {
        assert!(!cache.exists(key).await.unwrap());
    }
}

#[tokio::test]
async fn test_set_operations() {
    let cache = cache().await;
    assert_eq!(cache.sadd("s1", &["a", "b", "c"]).await.unwrap(), 3);
    assert_eq!(cache.sadd("s1", &["a", "d"]).await.unwrap(), 1);
    assert_eq!(cache.sadd("s2", &["b", "x"]).await.unwrap(), 2);

    assert!(cache.sismember("s1", "d").await.unwrap());
    assert!(!cache.sismember("s1", "x").await.unwrap());

    let mut diff = cache.sdiff(&["s1", "s2"]).await.unwrap();
    diff.sort();
    assert_eq!(diff, vec!["a", "c", "d"]);

    let mut union = cache.sunion(&["s1", "s2"]).await.unwrap();
    union.sort();
    assert_eq!(union, vec!["a", "b", "c", "d", "x"]);

    assert!(cache.smove("s1", "s2", "a").await.unwrap());
    assert!(!cache.smove("s1", "s2", "a").await.unwrap());
    assert!(cache.sismember("s2", "a").await.unwrap());

    assert_eq!(cache.srem("s1", &["b", "zzz"]).await.unwrap(), 1);
    let popped = cache.spop("s1").await.unwrap().unwrap();
    assert!(popped == "c" || popped == "d");
    assert_eq!(cache.smembers("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sorted_set_ordering() {
    let cache = cache().await;
    let pairs = HashMap::from([
        ("carol".to_string(), 30.0),
        ("alice".to_string(), 10.0),
        ("bob".to_string(), 20.0),
    ]);
    assert_eq!(cache.zadd("board", &pairs).await.unwrap(), 3);

    assert_eq!(
        cache.zrange("board", 0, -1, false).await.unwrap(),
        vec!["alice", "bob", "carol"]
    );
    assert_eq!(
        cache.zrevrange("board", 0, 1, false).await.unwrap(),
        vec!["carol", "bob"]
    );
    assert_eq!(
        cache.zrange_by_score("board", 15.0, 30.0, true).await.unwrap(),
        vec!["bob", "20", "carol", "30"]
    );

    assert_eq!(cache.zincrby("board", "alice", 25.0).await.unwrap(), 35.0);
    assert_eq!(cache.zscore("board", "alice").await.unwrap(), Some(35.0));
    assert_eq!(cache.zscore("board", "dave").await.unwrap(), None);
    assert_eq!(
        cache.zrange("board", -1, -1, false).await.unwrap(),
        vec!["alice"]
    );

    assert_eq!(cache.zrem_range_by_rank("board", 0, 0).await.unwrap(), 1);
    assert_eq!(cache.zrem_range_by_score("board", 0.0, 31.0).await.unwrap(), 1);
    assert_eq!(cache.zrem("board", &["alice", "ghost"]).await.unwrap(), 1);
    assert!(!cache.exists("board").await.unwrap());
}

#[tokio::test]
async fn test_hash_operations() {
    let cache = cache().await;
    assert!(cache.hset("user:1", "name", "ann").await.unwrap());
    assert!(!cache.hset("user:1", "name", "anna").await.unwrap());
    cache
        .hmset("user:1", &[("age", "30"), ("city", "Oslo")])
        .await
        .unwrap();

    assert_eq!(cache.hget("user:1", "name").await.unwrap(), Some("anna".to_string()));
    assert!(cache.hexists("user:1", "age").await.unwrap());
    assert_eq!(cache.hincrby("user:1", "age", 1).await.unwrap(), 31);
    assert_eq!(cache.hincrby("user:1", "visits", 5).await.unwrap(), 5);

    let all = cache.hgetall("user:1").await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all.get("city").map(String::as_str), Some("Oslo"));

    let mut values = cache.hvals("user:1").await.unwrap();
    values.sort();
    assert_eq!(values, vec!["31", "5", "Oslo", "anna"]);

    assert_eq!(cache.hdel("user:1", &["city", "nope"]).await.unwrap(), 1);
    assert_eq!(
        cache.hmget("user:1", &["name", "city"]).await.unwrap(),
        vec![Some("anna".to_string()), None]
    );
}

#[tokio::test]
async fn test_hincrby_on_non_integer_field() {
    let cache = cache().await;
    cache.hset("h", "f", "abc").await.unwrap();
    assert!(matches!(
        cache.hincrby("h", "f", 1).await,
        Err(CacheError::Command(_))
    ));
}

#[tokio::test]
async fn test_list_operations() {
    let cache = cache().await;
    assert_eq!(cache.rpush("q", &["b", "c"]).await.unwrap(), 2);
    assert_eq!(cache.lpush("q", &["a"]).await.unwrap(), 3);
    assert_eq!(cache.rpush("q", &["b"]).await.unwrap(), 4);
    assert_eq!(cache.lrange("q", 0, -1).await.unwrap(), vec!["a", "b", "c", "b"]);

    assert_eq!(cache.lrem("q", 0, "b").await.unwrap(), 2);
    assert_eq!(cache.lpop("q").await.unwrap(), Some("a".to_string()));
    assert_eq!(cache.blpop("q", 1).await.unwrap(), Some("c".to_string()));
    assert_eq!(cache.lpop("q").await.unwrap(), None);
}

#[tokio::test]
async fn test_blpop_receives_value_from_another_task() {
    let cache: Arc<Box<dyn Cache>> = Arc::new(cache().await);
    let producer = Arc::clone(&cache);

    let waiter = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move { cache.blpop("jobs", 5).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    producer.rpush("jobs", &["job-1"]).await.unwrap();

    let popped = waiter.await.unwrap().unwrap();
    assert_eq!(popped, Some("job-1".to_string()));
}

#[tokio::test]
async fn test_type_mismatch_is_command_error() {
    let cache = cache().await;
    cache.set("plain", b"v", SetOptions::default()).await.unwrap();
    assert!(matches!(cache.lpop("plain").await, Err(CacheError::Command(_))));
    assert!(matches!(cache.sadd("plain", &["x"]).await, Err(CacheError::Command(_))));
    assert!(matches!(cache.hget("plain", "f").await, Err(CacheError::Command(_))));
}
