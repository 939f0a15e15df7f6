//! # Store Access Facade
//!
//! Each method is one backend call plus one `settle` step. `Some(v)` is the
//! `(v, ok = true)` outcome; `None` is `(zero, ok = false)`.

use std::time::Duration;

use rmq_common::{BackendResult, StoreBackend, Ttl};

use crate::fault::{FaultLog, Operation, TracingFaultLog};

/// Collapses one backend result into an optional value.
///
/// Expected absence becomes `None` silently; any other error becomes `None`
/// after exactly one report to `log`.
pub fn settle<T, L>(log: &L, op: Operation, result: BackendResult<T>) -> Option<T>
where
    L: FaultLog + ?Sized,
{
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_nil() => None,
        Err(err) => {
            log.fault(op, &err);
            None
        }
    }
}

/// Uniform capability set over a single backend handle.
///
/// `Facade` is `Send + Sync` whenever the backend and the log are, and holds
/// no per-call state, so one instance can be shared across threads.
#[derive(Debug)]
pub struct Facade<B, L = TracingFaultLog> {
    backend: B,
    log: L,
}

impl<B: StoreBackend> Facade<B> {
    /// Wraps `backend`, reporting faults through `tracing`.
    pub fn new(backend: B) -> Self {
        Facade {
            backend,
            log: TracingFaultLog,
        }
    }
}

impl<B: StoreBackend, L: FaultLog> Facade<B, L> {
    /// Wraps `backend`, reporting faults to `log`.
    pub fn with_log(backend: B, log: L) -> Self {
        Facade { backend, log }
    }

    /// Returns the wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the facade and returns the backend handle.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Stores `value` at `key`. A zero `expiration` means no expiration.
    pub fn set_string(&self, key: &str, value: &str, expiration: Duration) -> bool {
        self.settle(Operation::SetString, self.backend.set(key, value, expiration))
            .is_some()
    }

    /// Deletes `key` and returns the number of removed keys.
    pub fn delete_key(&self, key: &str) -> Option<u64> {
        self.settle(Operation::DeleteKey, self.backend.del(key))
    }

    /// Returns the TTL of `key`; `None` for a missing key or a fault.
    pub fn get_ttl(&self, key: &str) -> Option<Ttl> {
        self.settle(Operation::GetTtl, self.backend.ttl(key))
    }

    /// Pushes `value` onto the head of the list at `key`.
    pub fn list_push(&self, key: &str, value: &str) -> bool {
        self.settle(Operation::ListPush, self.backend.lpush(key, value))
            .is_some()
    }

    pub fn list_length(&self, key: &str) -> Option<u64> {
        self.settle(Operation::ListLength, self.backend.llen(key))
    }

    /// Removes up to `count` occurrences of `value`.
    ///
    /// `count > 0` scans from the head, `count < 0` from the tail, and `0`
    /// removes every occurrence.
    pub fn list_remove(&self, key: &str, count: i64, value: &str) -> Option<u64> {
        self.settle(Operation::ListRemove, self.backend.lrem(key, count, value))
    }

    /// Trims the list at `key` to `start..=stop`.
    ///
    /// Faults are logged and otherwise discarded.
    pub fn list_trim(&self, key: &str, start: i64, stop: i64) {
        self.settle(Operation::ListTrim, self.backend.ltrim(key, start, stop));
    }

    /// Atomically moves the tail of `source` to the head of `destination`.
    pub fn list_pop_push(&self, source: &str, destination: &str) -> Option<String> {
        self.settle(
            Operation::ListPopPush,
            self.backend.rpoplpush(source, destination),
        )
    }

    pub fn set_add(&self, key: &str, value: &str) -> bool {
        self.settle(Operation::SetAdd, self.backend.sadd(key, value))
            .is_some()
    }

    /// Returns the members of the set at `key`, empty on any failure.
    pub fn set_members(&self, key: &str) -> Vec<String> {
        self.settle(Operation::SetMembers, self.backend.smembers(key))
            .unwrap_or_default()
    }

    /// Removes `value` from the set at `key` and returns the removed count.
    pub fn set_remove(&self, key: &str, value: &str) -> Option<u64> {
        self.settle(Operation::SetRemove, self.backend.srem(key, value))
    }

    /// Flushes the current database. Irreversible; faults are logged and
    /// otherwise discarded.
    pub fn flush_database(&self) {
        self.settle(Operation::FlushDatabase, self.backend.flushdb());
    }

    #[inline]
    fn settle<T>(&self, op: Operation, result: BackendResult<T>) -> Option<T> {
        settle(&self.log, op, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmq_common::BackendError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Operation, String)>>);

    impl FaultLog for Recorder {
        fn fault(&self, op: Operation, error: &BackendError) {
            self.0.lock().unwrap().push((op, error.to_string()));
        }
    }

    #[test]
    fn settle_passes_values_through() {
        let log = Recorder::default();
        assert_eq!(settle(&log, Operation::ListLength, Ok(3u64)), Some(3));
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn settle_is_silent_on_nil() {
        let log = Recorder::default();
        let result: BackendResult<u64> = Err(BackendError::Nil);
        assert_eq!(settle(&log, Operation::DeleteKey, result), None);
        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn settle_reports_faults_once() {
        let log = Recorder::default();
        let result: BackendResult<()> = Err(BackendError::client("connection reset"));
        assert_eq!(settle(&log, Operation::ListTrim, result), None);
        let faults = log.0.lock().unwrap();
        assert_eq!(
            *faults,
            vec![(Operation::ListTrim, "connection reset".to_string())]
        );
    }

    #[test]
    fn settle_accepts_unsized_logs() {
        let log: Box<dyn FaultLog> = Box::new(Recorder::default());
        let result: BackendResult<()> = Err(BackendError::WrongType);
        assert_eq!(settle(log.as_ref(), Operation::SetAdd, result), None);
    }
}
