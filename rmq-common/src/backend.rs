//! # Backend Capability Trait
//!
//! Purpose: Name the minimal set of store primitives the facade needs so
//! single-node, clustered, and in-process backends are interchangeable.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: Callers hold a `StoreBackend`, never a concrete client.
//! 2. **One Call, One Primitive**: Each method maps to exactly one store command.
//! 3. **Shared Access**: Every method takes `&self`; implementations own their
//!    concurrency story (pool, locks).
//! 4. **Object Safe**: `Box<dyn StoreBackend>` works for runtime-selected topology.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BackendResult;
use crate::types::Ttl;

/// Store primitives exposed to the facade.
///
/// Expected absence is reported as `BackendError::Nil`; everything else that
/// goes wrong is a fault.
pub trait StoreBackend: Send + Sync {
    /// `SET key value`, with an expiration when `expiration` is non-zero.
    fn set(&self, key: &str, value: &str, expiration: Duration) -> BackendResult<()>;

    /// `DEL key`. Returns the number of keys removed.
    fn del(&self, key: &str) -> BackendResult<u64>;

    /// `TTL key`. Missing keys are `Nil`.
    fn ttl(&self, key: &str) -> BackendResult<Ttl>;

    /// `LPUSH key value`. Returns the list length after the push.
    fn lpush(&self, key: &str, value: &str) -> BackendResult<u64>;

    /// `LLEN key`.
    fn llen(&self, key: &str) -> BackendResult<u64>;

    /// `LREM key count value`. Returns the number of removed elements.
    ///
    /// `count > 0` scans head to tail, `count < 0` tail to head, `0` removes all.
    fn lrem(&self, key: &str, count: i64, value: &str) -> BackendResult<u64>;

    /// `LTRIM key start stop`.
    fn ltrim(&self, key: &str, start: i64, stop: i64) -> BackendResult<()>;

    /// `RPOPLPUSH source destination`, atomically. An empty source is `Nil`.
    fn rpoplpush(&self, source: &str, destination: &str) -> BackendResult<String>;

    /// `SADD key value`. Returns the number of members added.
    fn sadd(&self, key: &str, value: &str) -> BackendResult<u64>;

    /// `SMEMBERS key`.
    fn smembers(&self, key: &str) -> BackendResult<Vec<String>>;

    /// `SREM key value`. Returns the number of members removed.
    fn srem(&self, key: &str, value: &str) -> BackendResult<u64>;

    /// `FLUSHDB`.
    fn flushdb(&self) -> BackendResult<()>;
}

macro_rules! forward_backend {
    ($($ptr:ty),+ $(,)?) => {$(
        impl<B: StoreBackend + ?Sized> StoreBackend for $ptr {
            fn set(&self, key: &str, value: &str, expiration: Duration) -> BackendResult<()> {
                (**self).set(key, value, expiration)
            }

            fn del(&self, key: &str) -> BackendResult<u64> {
                (**self).del(key)
            }

            fn ttl(&self, key: &str) -> BackendResult<Ttl> {
                (**self).ttl(key)
            }

            fn lpush(&self, key: &str, value: &str) -> BackendResult<u64> {
                (**self).lpush(key, value)
            }

            fn llen(&self, key: &str) -> BackendResult<u64> {
                (**self).llen(key)
            }

            fn lrem(&self, key: &str, count: i64, value: &str) -> BackendResult<u64> {
                (**self).lrem(key, count, value)
            }

            fn ltrim(&self, key: &str, start: i64, stop: i64) -> BackendResult<()> {
                (**self).ltrim(key, start, stop)
            }

            fn rpoplpush(&self, source: &str, destination: &str) -> BackendResult<String> {
                (**self).rpoplpush(source, destination)
            }

            fn sadd(&self, key: &str, value: &str) -> BackendResult<u64> {
                (**self).sadd(key, value)
            }

            fn smembers(&self, key: &str) -> BackendResult<Vec<String>> {
                (**self).smembers(key)
            }

            fn srem(&self, key: &str, value: &str) -> BackendResult<u64> {
                (**self).srem(key, value)
            }

            fn flushdb(&self) -> BackendResult<()> {
                (**self).flushdb()
            }
        }
    )+};
}

forward_backend!(&B, Box<B>, Arc<B>);
