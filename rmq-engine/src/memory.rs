//! # In-Memory Backend
//!
//! Provide an in-process `StoreBackend` with sharded locking and lazy TTL
//! expiry, speaking the same string/list/set semantics as a Redis node.
//!
//! ## Usage
//!
//! - Use `MemoryBackend::new()` for a default sharded backend.
//! - Use `MemoryBackend::with_shard_count` to pin the shard count (tests use a
//!   small count to force cross-shard moves).
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: Per-shard locks reduce contention under concurrency.
//! 2. **TTL on Access**: Expired entries are dropped when touched.
//! 3. **Ordered Double Locking**: `rpoplpush` across shards takes both locks in
//!    ascending shard order, so the move is atomic and cannot deadlock.
//! 4. **Strategy Pattern**: Implements `StoreBackend` to keep callers decoupled.
//!
//! ## Structure Overview
//!
//! ```text
//! MemoryBackend
//!   └── shards: Vec<Shard>
//!         └── Shard
//!               └── inner: RwLock<ShardInner>
//!                     └── map: HashMap<String, Entry>
//!                           └── Entry { value: Str | List | Set, expires_at }
//! ```

use std::collections::VecDeque;
use std::hash::{BuildHasher, Hasher};
use std::time::{Duration, Instant};

use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use rmq_common::{BackendError, BackendResult, StoreBackend, Ttl};

/// Default shards = CPU count * multiplier to reduce lock contention.
const DEFAULT_SHARD_MULTIPLIER: usize = 4;

/// Stored value kinds.
#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

/// A single key's value plus its absolute expiration.
#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    /// Returns true when the entry has expired at `now`.
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Per-shard storage container.
#[derive(Debug)]
struct ShardInner {
    map: HashMap<String, Entry, RandomState>,
}

impl ShardInner {
    fn new(hash_state: RandomState) -> Self {
        ShardInner {
            map: HashMap::with_hasher(hash_state),
        }
    }

    /// Returns the live entry for `key`, dropping it first if it expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            self.map.remove(key);
        }
        self.map.get_mut(key)
    }

    /// Returns the list stored at `key`, `None` when missing.
    fn list(&mut self, key: &str, now: Instant) -> BackendResult<Option<&mut VecDeque<String>>> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(BackendError::WrongType),
        }
    }

    /// Returns the list stored at `key`, creating an empty one when missing.
    fn list_or_create(&mut self, key: &str, now: Instant) -> BackendResult<&mut VecDeque<String>> {
        if self.live(key, now).is_none() {
            self.map
                .insert(key.to_owned(), Entry::new(Value::List(VecDeque::new())));
        }
        match self.map.get_mut(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list),
            _ => Err(BackendError::WrongType),
        }
    }

    /// Returns the set stored at `key`, `None` when missing.
    fn members(&mut self, key: &str, now: Instant) -> BackendResult<Option<&mut HashSet<String>>> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(BackendError::WrongType),
        }
    }

    /// Returns the set stored at `key`, creating an empty one when missing.
    fn members_or_create(&mut self, key: &str, now: Instant) -> BackendResult<&mut HashSet<String>> {
        if self.live(key, now).is_none() {
            self.map
                .insert(key.to_owned(), Entry::new(Value::Set(HashSet::new())));
        }
        match self.map.get_mut(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set),
            _ => Err(BackendError::WrongType),
        }
    }

    /// Type-checks `key` as a list and reports whether it exists.
    fn has_list(&mut self, key: &str, now: Instant) -> BackendResult<bool> {
        Ok(self.list(key, now)?.is_some())
    }

    /// Pops the tail of the list at `key`.
    fn take_tail(&mut self, key: &str, now: Instant) -> BackendResult<String> {
        let value = self
            .list(key, now)?
            .and_then(|list| list.pop_back())
            .ok_or(BackendError::Nil)?;
        self.remove_if_empty(key);
        Ok(value)
    }

    /// Pushes onto the head of the list at `key` and returns the new length.
    fn push_head(&mut self, key: &str, value: String, now: Instant) -> BackendResult<u64> {
        let list = self.list_or_create(key, now)?;
        list.push_front(value);
        Ok(list.len() as u64)
    }

    /// Containers never linger empty, matching Redis.
    fn remove_if_empty(&mut self, key: &str) {
        let empty = match self.map.get(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list.is_empty(),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => set.is_empty(),
            _ => false,
        };
        if empty {
            self.map.remove(key);
        }
    }

    fn live_len(&self, now: Instant) -> usize {
        self.map.values().filter(|entry| !entry.is_expired(now)).count()
    }
}

/// Per-shard lock wrapper.
#[derive(Debug)]
struct Shard {
    inner: RwLock<ShardInner>,
}

/// Sharded in-memory implementation of `StoreBackend`.
#[derive(Debug)]
pub struct MemoryBackend {
    /// Per-shard storage.
    shards: Vec<Shard>,
    /// Bitmask for fast shard selection (power-of-two shard count).
    shard_mask: usize,
    /// Hash state used to pick shards deterministically.
    hash_state: RandomState,
}

impl MemoryBackend {
    /// Creates a backend with a default shard count based on CPU parallelism.
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::with_shard_count(threads.saturating_mul(DEFAULT_SHARD_MULTIPLIER))
    }

    /// Creates a backend with a caller-provided shard count.
    ///
    /// The count is normalized to the next power of two.
    pub fn with_shard_count(shards: usize) -> Self {
        let shard_count = normalize_shard_count(shards);
        let hash_state = RandomState::new();
        let shards = (0..shard_count)
            .map(|_| Shard {
                inner: RwLock::new(ShardInner::new(hash_state.clone())),
            })
            .collect();

        MemoryBackend {
            shards,
            shard_mask: shard_count - 1,
            hash_state,
        }
    }

    /// Number of live keys across all shards.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| shard.inner.read().live_len(now))
            .sum()
    }

    /// Returns true when no live key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the string stored at `key`, `Nil` when missing.
    pub fn get(&self, key: &str) -> BackendResult<String> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        match inner.live(key, now) {
            None => Err(BackendError::Nil),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(value.clone()),
            Some(_) => Err(BackendError::WrongType),
        }
    }

    /// Hashes a key to its owning shard index.
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key.as_bytes());
        (hasher.finish() as usize) & self.shard_mask
    }

    /// Returns the shard responsible for a given key.
    fn shard_for(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    /// Replaces any existing value and resets its TTL.
    fn set(&self, key: &str, value: &str, expiration: Duration) -> BackendResult<()> {
        let now = Instant::now();
        let expires_at = if expiration.is_zero() {
            None
        } else {
            Some(now.checked_add(expiration).ok_or_else(|| {
                BackendError::client("ERR invalid expire time in 'set' command")
            })?)
        };
        let mut inner = self.shard_for(key).inner.write();
        inner.map.insert(
            key.to_owned(),
            Entry {
                value: Value::Str(value.to_owned()),
                expires_at,
            },
        );
        Ok(())
    }

    fn del(&self, key: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let existed = inner.live(key, now).is_some();
        if existed {
            inner.map.remove(key);
        }
        Ok(existed as u64)
    }

    fn ttl(&self, key: &str) -> BackendResult<Ttl> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let entry = inner.live(key, now).ok_or(BackendError::Nil)?;
        Ok(match entry.expires_at {
            None => Ttl::NoExpiry,
            Some(deadline) => Ttl::ExpiresIn(deadline.saturating_duration_since(now)),
        })
    }

    fn lpush(&self, key: &str, value: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        inner.push_head(key, value.to_owned(), now)
    }

    fn llen(&self, key: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        Ok(inner.list(key, now)?.map_or(0, |list| list.len() as u64))
    }

    fn lrem(&self, key: &str, count: i64, value: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let list = match inner.list(key, now)? {
            Some(list) => list,
            None => return Ok(0),
        };

        let limit = if count == 0 {
            u64::MAX
        } else {
            count.unsigned_abs()
        };
        let mut removed = 0u64;
        if count >= 0 {
            let mut idx = 0;
            while idx < list.len() && removed < limit {
                if list[idx] == value {
                    list.remove(idx);
                    removed += 1;
                } else {
                    idx += 1;
                }
            }
        } else {
            let mut idx = list.len();
            while idx > 0 && removed < limit {
                idx -= 1;
                if list[idx] == value {
                    list.remove(idx);
                    removed += 1;
                }
            }
        }

        inner.remove_if_empty(key);
        Ok(removed)
    }

    fn ltrim(&self, key: &str, start: i64, stop: i64) -> BackendResult<()> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let list = match inner.list(key, now)? {
            Some(list) => list,
            None => return Ok(()),
        };

        match trim_bounds(list.len(), start, stop) {
            Some((first, last)) => {
                list.truncate(last + 1);
                list.drain(..first);
            }
            None => list.clear(),
        }

        inner.remove_if_empty(key);
        Ok(())
    }

    fn rpoplpush(&self, source: &str, destination: &str) -> BackendResult<String> {
        let now = Instant::now();
        let src_idx = self.shard_index(source);
        let dst_idx = self.shard_index(destination);

        if src_idx == dst_idx {
            let mut inner = self.shards[src_idx].inner.write();
            if !inner.has_list(source, now)? {
                return Err(BackendError::Nil);
            }
            inner.has_list(destination, now)?;
            let value = inner.take_tail(source, now)?;
            inner.push_head(destination, value.clone(), now)?;
            return Ok(value);
        }

        let mut low = self.shards[src_idx.min(dst_idx)].inner.write();
        let mut high = self.shards[src_idx.max(dst_idx)].inner.write();
        let (src, dst) = if src_idx < dst_idx {
            (&mut *low, &mut *high)
        } else {
            (&mut *high, &mut *low)
        };

        if !src.has_list(source, now)? {
            return Err(BackendError::Nil);
        }
        dst.has_list(destination, now)?;
        let value = src.take_tail(source, now)?;
        dst.push_head(destination, value.clone(), now)?;
        Ok(value)
    }

    fn sadd(&self, key: &str, value: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let set = inner.members_or_create(key, now)?;
        Ok(set.insert(value.to_owned()) as u64)
    }

    fn smembers(&self, key: &str) -> BackendResult<Vec<String>> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        Ok(inner
            .members(key, now)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn srem(&self, key: &str, value: &str) -> BackendResult<u64> {
        let now = Instant::now();
        let mut inner = self.shard_for(key).inner.write();
        let removed = match inner.members(key, now)? {
            Some(set) => set.remove(value),
            None => return Ok(0),
        };
        inner.remove_if_empty(key);
        Ok(removed as u64)
    }

    fn flushdb(&self) -> BackendResult<()> {
        for shard in &self.shards {
            shard.inner.write().map.clear();
        }
        Ok(())
    }
}

/// Resolves `LTRIM` indices against a list of `len` elements.
///
/// Returns the inclusive range to keep, or `None` when nothing survives.
fn trim_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop.min(len - 1) as usize))
}

/// Normalizes shard counts to a power of two for fast masking.
fn normalize_shard_count(count: usize) -> usize {
    count.max(1).next_power_of_two()
}
