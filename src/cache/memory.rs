//! In-process cache adapter
//!
//! Registered under the name "memory". Holds every value type the remote
//! adapter supports (strings, counters, hashes, sets, sorted sets and lists)
//! with optional per-key expiry, and reports type mismatches with the same
//! messages the remote store uses so callers see one error surface.
//!
//! Expired keys are dropped lazily on access and by a background sweeper
//! started from `start_and_gc`. The sweeper stops when the adapter is dropped.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::error::CacheError;
use super::traits::{Cache, SetCondition, SetOptions};
use crate::constants::DEFAULT_GC_INTERVAL_SECS;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
const NOT_A_FLOAT: &str = "ERR value is not a valid float";
const OVERFLOW: &str = "ERR increment or decrement would overflow";

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
    List(VecDeque<String>),
}

impl Value {
    fn hash(&mut self) -> Option<&mut HashMap<String, String>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    fn set(&mut self) -> Option<&mut HashSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    fn zset(&mut self) -> Option<&mut HashMap<String, f64>> {
        match self {
            Value::ZSet(z) => Some(z),
            _ => None,
        }
    }

    fn list(&mut self) -> Option<&mut VecDeque<String>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::ZSet(z) => z.is_empty(),
            Value::List(l) => l.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Entries = HashMap<String, Entry>;

struct Shared {
    entries: Mutex<Entries>,
    /// Signalled on every list push so blocked `blpop` callers re-check.
    pushed: Notify,
}

impl Shared {
    /// Removes every expired entry; returns how many were dropped.
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

fn wrong_type() -> CacheError {
    CacheError::Command(WRONG_TYPE.to_string())
}

/// Expiry instant `ttl` from now; a ttl past the clock's range is rejected
/// the way the store rejects it.
fn expiry_after(ttl: Duration, command: &str) -> Result<Instant, CacheError> {
    Instant::now().checked_add(ttl).ok_or_else(|| {
        CacheError::Command(format!("ERR invalid expire time in '{}' command", command))
    })
}

fn purge_if_expired(entries: &mut Entries, key: &str) {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut Entry> {
    purge_if_expired(entries, key);
    entries.get_mut(key)
}

/// Typed read access to a collection value.
///
/// A missing key is `None`; a key holding another type is a WRONGTYPE error.
fn container<'a, T>(
    entries: &'a mut Entries,
    key: &str,
    project: fn(&mut Value) -> Option<&mut T>,
) -> Result<Option<&'a mut T>, CacheError> {
    match live(entries, key) {
        Some(entry) => project(&mut entry.value).map(Some).ok_or_else(wrong_type),
        None => Ok(None),
    }
}

/// Like [`container`], but a missing key is first created with `empty`.
fn container_or_insert<'a, T>(
    entries: &'a mut Entries,
    key: &str,
    empty: fn() -> Value,
    project: fn(&mut Value) -> Option<&mut T>,
) -> Result<&'a mut T, CacheError> {
    purge_if_expired(entries, key);
    let entry = entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::new(empty()));
    project(&mut entry.value).ok_or_else(wrong_type)
}

fn empty_hash() -> Value {
    Value::Hash(HashMap::new())
}

fn empty_set() -> Value {
    Value::Set(HashSet::new())
}

fn empty_zset() -> Value {
    Value::ZSet(HashMap::new())
}

fn empty_list() -> Value {
    Value::List(VecDeque::new())
}

/// Collections are deleted once they become empty.
fn drop_if_empty(entries: &mut Entries, key: &str) {
    if entries.get(key).is_some_and(|e| e.value.is_empty()) {
        entries.remove(key);
    }
}

fn parse_integer(bytes: &[u8]) -> Result<i64, CacheError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CacheError::Command(NOT_AN_INTEGER.to_string()))
}

/// Resolves Redis-style inclusive indexes against a length.
fn index_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn sorted_members(zset: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
}

fn render(members: impl IntoIterator<Item = (String, f64)>, with_scores: bool) -> Vec<String> {
    let mut out = Vec::new();
    for (member, score) in members {
        out.push(member);
        if with_scores {
            out.push(score.to_string());
        }
    }
    out
}

/// In-process adapter with Redis-compatible semantics
pub struct MemoryCache {
    shared: Arc<Shared>,
    sweeper: Option<JoinHandle<()>>,
    gc_interval: Duration,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                pushed: Notify::new(),
            }),
            sweeper: None,
            gc_interval: Duration::from_secs(DEFAULT_GC_INTERVAL_SECS),
        }
    }

    /// Registry factory
    pub fn instance() -> Box<dyn Cache> {
        Box::new(Self::new())
    }

    /// Number of keys currently held, including not yet swept expired ones
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    /// Drops expired keys now; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.shared.sweep()
    }

    fn pop_front(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        let popped = match container(&mut entries, key, Value::list)? {
            Some(list) => list.pop_front(),
            None => None,
        };
        drop_if_empty(&mut entries, key);
        Ok(popped)
    }

    fn push(&self, key: &str, values: &[&str], front: bool) -> Result<usize, CacheError> {
        if values.is_empty() {
            return Ok(0);
        }
        let len = {
            let mut entries = self.shared.entries.lock();
            let list = container_or_insert(&mut entries, key, empty_list, Value::list)?;
            for value in values {
                if front {
                    list.push_front(value.to_string());
                } else {
                    list.push_back(value.to_string());
                }
            }
            list.len()
        };
        self.shared.pushed.notify_waiters();
        Ok(len)
    }

    fn incr_by_value(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut entries = self.shared.entries.lock();
        match live(&mut entries, key) {
            Some(entry) => {
                let current = match &entry.value {
                    Value::Str(bytes) => parse_integer(bytes)?,
                    _ => return Err(wrong_type()),
                };
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| CacheError::Command(OVERFLOW.to_string()))?;
                // expiry is kept, as INCRBY does
                entry.value = Value::Str(next.to_string().into_bytes());
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry::new(Value::Str(delta.to_string().into_bytes())),
                );
                Ok(delta)
            }
        }
    }

    fn read_set(&self, key: &str) -> Result<HashSet<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::set)?
            .map(|s| s.clone())
            .unwrap_or_default())
    }

    fn read_zset(&self, key: &str) -> Result<Vec<(String, f64)>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::zset)?
            .map(|z| sorted_members(z))
            .unwrap_or_default())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.shared.entries.lock();
        match live(&mut entries, key) {
            Some(Entry {
                value: Value::Str(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        let mut entries = self.shared.entries.lock();
        // MGET reports non-string keys as absent
        Ok(keys
            .iter()
            .map(|key| match live(&mut entries, key) {
                Some(Entry {
                    value: Value::Str(bytes),
                    ..
                }) => Some(bytes.clone()),
                _ => None,
            })
            .collect())
    }

    async fn set(&self, key: &str, value: &[u8], options: SetOptions) -> Result<(), CacheError> {
        let expires_at = options
            .ttl()
            .map(|ttl| expiry_after(ttl, "set"))
            .transpose()?;
        let mut entries = self.shared.entries.lock();
        let exists = live(&mut entries, key).is_some();
        let allowed = match options.condition {
            SetCondition::Always => true,
            SetCondition::MustExist => exists,
            SetCondition::MustNotExist => !exists,
        };
        if !allowed {
            return Err(CacheError::ConditionNotMet);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_vec()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.set(key, value, SetOptions {
            expire: Some(ttl),
            condition: SetCondition::Always,
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.shared.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(live(&mut entries, key).is_some())
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        if live(&mut entries, key).is_none() {
            return Ok(false);
        }
        if seconds <= 0 {
            entries.remove(key);
            return Ok(true);
        }
        let expires_at = expiry_after(Duration::from_secs(seconds.unsigned_abs()), "expire")?;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(expires_at);
        }
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.incr_by_value(key, 1)
    }

    async fn incr_by(&self, key: &str, increment: i64) -> Result<i64, CacheError> {
        self.incr_by_value(key, increment)
    }

    async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        self.incr_by_value(key, -1)
    }

    async fn decr_by(&self, key: &str, decrement: i64) -> Result<i64, CacheError> {
        let delta = decrement
            .checked_neg()
            .ok_or_else(|| CacheError::Command(OVERFLOW.to_string()))?;
        self.incr_by_value(key, delta)
    }

    async fn setnx(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        if live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(Value::Str(value.to_vec())));
        Ok(true)
    }

    async fn sadd(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut entries = self.shared.entries.lock();
        let set = container_or_insert(&mut entries, key, empty_set, Value::set)?;
        Ok(members
            .iter()
            .filter(|m| set.insert(m.to_string()))
            .count())
    }

    async fn spop(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        let popped = match container(&mut entries, key, Value::set)? {
            Some(set) => {
                let member = set.iter().next().cloned();
                if let Some(m) = &member {
                    set.remove(m);
                }
                member
            }
            None => None,
        };
        drop_if_empty(&mut entries, key);
        Ok(popped)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::set)?.is_some_and(|s| s.contains(member)))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.read_set(key)?.into_iter().collect())
    }

    async fn sdiff(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(Vec::new());
        };
        let mut entries = self.shared.entries.lock();
        let mut result = container(&mut entries, first, Value::set)?
            .map(|s| s.clone())
            .unwrap_or_default();
        for key in rest {
            if let Some(other) = container(&mut entries, key, Value::set)? {
                result.retain(|m| !other.contains(m));
            }
        }
        Ok(result.into_iter().collect())
    }

    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        // type-check the destination before touching the source
        container(&mut entries, destination, Value::set)?;
        let removed = match container(&mut entries, source, Value::set)? {
            Some(set) => set.remove(member),
            None => false,
        };
        if !removed {
            return Ok(false);
        }
        drop_if_empty(&mut entries, source);
        container_or_insert(&mut entries, destination, empty_set, Value::set)?
            .insert(member.to_string());
        Ok(true)
    }

    async fn srem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::set)? {
            Some(set) => members.iter().filter(|m| set.remove(**m)).count(),
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn sunion(&self, keys: &[&str]) -> Result<Vec<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        let mut result = HashSet::new();
        for key in keys {
            if let Some(set) = container(&mut entries, key, Value::set)? {
                result.extend(set.iter().cloned());
            }
        }
        Ok(result.into_iter().collect())
    }

    async fn zadd(&self, key: &str, pairs: &HashMap<String, f64>) -> Result<usize, CacheError> {
        if pairs.is_empty() {
            return Ok(0);
        }
        if pairs.values().any(|s| s.is_nan()) {
            return Err(CacheError::Command(NOT_A_FLOAT.to_string()));
        }
        let mut entries = self.shared.entries.lock();
        let zset = container_or_insert(&mut entries, key, empty_zset, Value::zset)?;
        let mut added = 0;
        for (member, score) in pairs {
            if zset.insert(member.clone(), *score).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::zset)?.and_then(|z| z.get(member).copied()))
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        let members = self.read_zset(key)?;
        Ok(match index_range(members.len(), start, stop) {
            Some((from, to)) => render(members.into_iter().skip(from).take(to - from + 1), with_scores),
            None => Vec::new(),
        })
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        let members = self.read_zset(key)?;
        Ok(render(
            members.into_iter().filter(|(_, s)| *s >= min && *s <= max),
            with_scores,
        ))
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        with_scores: bool,
    ) -> Result<Vec<String>, CacheError> {
        let mut members = self.read_zset(key)?;
        members.reverse();
        Ok(match index_range(members.len(), start, stop) {
            Some((from, to)) => render(members.into_iter().skip(from).take(to - from + 1), with_scores),
            None => Vec::new(),
        })
    }

    async fn zrem(&self, key: &str, members: &[&str]) -> Result<usize, CacheError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::zset)? {
            Some(zset) => members.iter().filter(|m| zset.remove(**m).is_some()).count(),
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn zincrby(&self, key: &str, member: &str, increment: f64) -> Result<f64, CacheError> {
        let mut entries = self.shared.entries.lock();
        let zset = container_or_insert(&mut entries, key, empty_zset, Value::zset)?;
        let score = zset.get(member).copied().unwrap_or(0.0) + increment;
        if score.is_nan() {
            drop_if_empty(&mut entries, key);
            return Err(CacheError::Command(
                "ERR resulting score is not a number (NaN)".to_string(),
            ));
        }
        zset.insert(member.to_string(), score);
        Ok(score)
    }

    async fn zrem_range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<usize, CacheError> {
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::zset)? {
            Some(zset) => {
                let members = sorted_members(zset);
                match index_range(members.len(), start, stop) {
                    Some((from, to)) => {
                        for (member, _) in &members[from..=to] {
                            zset.remove(member);
                        }
                        to - from + 1
                    }
                    None => 0,
                }
            }
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<usize, CacheError> {
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::zset)? {
            Some(zset) => {
                let before = zset.len();
                zset.retain(|_, s| *s < min || *s > max);
                before - zset.len()
            }
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::hash)?.and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        let hash = container_or_insert(&mut entries, key, empty_hash, Value::hash)?;
        Ok(hash.insert(field.to_string(), value.to_string()).is_none())
    }

    async fn hincrby(&self, key: &str, field: &str, increment: i64) -> Result<i64, CacheError> {
        let mut entries = self.shared.entries.lock();
        let hash = container_or_insert(&mut entries, key, empty_hash, Value::hash)?;
        let current = match hash.get(field) {
            Some(v) => parse_integer(v.as_bytes()).map_err(|_| {
                CacheError::Command("ERR hash value is not an integer".to_string())
            }),
            None => Ok(0),
        };
        let next = current.and_then(|c| {
            c.checked_add(increment)
                .ok_or_else(|| CacheError::Command(OVERFLOW.to_string()))
        });
        match next {
            Ok(next) => {
                hash.insert(field.to_string(), next.to_string());
                Ok(next)
            }
            Err(e) => {
                drop_if_empty(&mut entries, key);
                Err(e)
            }
        }
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::hash)?.is_some_and(|h| h.contains_key(field)))
    }

    async fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, CacheError> {
        let mut entries = self.shared.entries.lock();
        let hash = container(&mut entries, key, Value::hash)?;
        Ok(fields
            .iter()
            .map(|f| hash.as_ref().and_then(|h| h.get(*f).cloned()))
            .collect())
    }

    async fn hmset(&self, key: &str, pairs: &[(&str, &str)]) -> Result<(), CacheError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut entries = self.shared.entries.lock();
        let hash = container_or_insert(&mut entries, key, empty_hash, Value::hash)?;
        for (field, value) in pairs {
            hash.insert(field.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn hvals(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::hash)?
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(container(&mut entries, key, Value::hash)?
            .map(|h| h.clone())
            .unwrap_or_default())
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<usize, CacheError> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::hash)? {
            Some(hash) => fields.iter().filter(|f| hash.remove(**f).is_some()).count(),
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn rpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        self.push(key, values, false)
    }

    async fn lpush(&self, key: &str, values: &[&str]) -> Result<usize, CacheError> {
        self.push(key, values, true)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.pop_front(key)
    }

    async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>, CacheError> {
        // 0 blocks until a value arrives, as BLPOP does; so does a timeout
        // too far out to represent
        let deadline = (timeout_secs > 0)
            .then(|| tokio::time::Instant::now().checked_add(Duration::from_secs(timeout_secs)))
            .flatten();

        loop {
            let notified = self.shared.pushed.notified();
            tokio::pin!(notified);
            // register before checking so a push in between is not missed
            notified.as_mut().enable();

            if let Some(value) = self.pop_front(key)? {
                return Ok(Some(value));
            }

            match deadline {
                Some(at) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, CacheError> {
        let mut entries = self.shared.entries.lock();
        let removed = match container(&mut entries, key, Value::list)? {
            Some(list) => {
                let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() };
                let mut removed = 0;
                if count >= 0 {
                    let mut i = 0;
                    while i < list.len() && removed < limit {
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let mut i = list.len();
                    while i > 0 && removed < limit {
                        i -= 1;
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                removed
            }
            None => 0,
        };
        drop_if_empty(&mut entries, key);
        Ok(removed)
    }

    async fn lrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let mut entries = self.shared.entries.lock();
        Ok(match container(&mut entries, key, Value::list)? {
            Some(list) => match index_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            },
            None => Vec::new(),
        })
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let cleared = {
            let mut entries = self.shared.entries.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        tracing::info!(deleted = cleared, "Cleared memory cache");
        Ok(())
    }

    async fn start_and_gc(&mut self, config: &str) -> Result<(), CacheError> {
        let raw: Map<String, JsonValue> = if config.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(config)?
        };

        let interval = match raw.get("interval") {
            None | Some(JsonValue::Null) => DEFAULT_GC_INTERVAL_SECS,
            Some(JsonValue::Number(n)) => n.as_u64().ok_or_else(|| {
                CacheError::Configuration(format!("interval must be a positive integer, got {}", n))
            })?,
            Some(JsonValue::String(s)) => s.trim().parse::<u64>().map_err(|_| {
                CacheError::Configuration(format!("interval must be an integer, got {:?}", s))
            })?,
            Some(other) => {
                return Err(CacheError::Configuration(format!(
                    "interval must be an integer, got {}",
                    other
                )))
            }
        };
        if interval == 0 {
            return Err(CacheError::Configuration(
                "interval must be at least 1 second".to_string(),
            ));
        }
        self.gc_interval = Duration::from_secs(interval);

        if let Some(previous) = self.sweeper.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let period = self.gc_interval;
        self.sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = shared.sweep();
                if removed > 0 {
                    tracing::debug!(removed = removed, "Swept expired memory cache entries");
                }
            }
        }));

        tracing::info!(interval_secs = interval, "Memory cache adapter ready");
        Ok(())
    }
}
