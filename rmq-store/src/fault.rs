//! # Fault Log
//!
//! Where backend faults are reported. The facade never logs directly; it
//! hands faults to an injected `FaultLog` so tests and embedders can capture
//! them without a global logger.

use std::fmt;
use std::sync::Arc;

use rmq_common::BackendError;

/// Fixed prefix tagging every fault line.
pub const LOG_PREFIX: &str = "rmq";

/// `tracing` target used by `TracingFaultLog`.
pub const LOG_TARGET: &str = "rmq";

/// Facade operation that produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetString,
    DeleteKey,
    GetTtl,
    ListPush,
    ListLength,
    ListRemove,
    ListTrim,
    ListPopPush,
    SetAdd,
    SetMembers,
    SetRemove,
    FlushDatabase,
}

impl Operation {
    /// Method name of the operation on `Facade`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SetString => "set_string",
            Operation::DeleteKey => "delete_key",
            Operation::GetTtl => "get_ttl",
            Operation::ListPush => "list_push",
            Operation::ListLength => "list_length",
            Operation::ListRemove => "list_remove",
            Operation::ListTrim => "list_trim",
            Operation::ListPopPush => "list_pop_push",
            Operation::SetAdd => "set_add",
            Operation::SetMembers => "set_members",
            Operation::SetRemove => "set_remove",
            Operation::FlushDatabase => "flush_database",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats the canonical fault line: `rmq: <error>`.
pub fn fault_line(error: &BackendError) -> String {
    format!("{}: {}", LOG_PREFIX, error)
}

/// Sink for backend faults.
///
/// Called at most once per facade operation, and never for expected absence.
pub trait FaultLog: Send + Sync {
    fn fault(&self, op: Operation, error: &BackendError);
}

/// Default sink: one `warn` event per fault under the `rmq` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultLog;

impl FaultLog for TracingFaultLog {
    fn fault(&self, op: Operation, error: &BackendError) {
        tracing::warn!(target: LOG_TARGET, op = op.as_str(), "{}", fault_line(error));
    }
}

impl<L: FaultLog + ?Sized> FaultLog for &L {
    fn fault(&self, op: Operation, error: &BackendError) {
        (**self).fault(op, error)
    }
}

impl<L: FaultLog + ?Sized> FaultLog for Box<L> {
    fn fault(&self, op: Operation, error: &BackendError) {
        (**self).fault(op, error)
    }
}

impl<L: FaultLog + ?Sized> FaultLog for Arc<L> {
    fn fault(&self, op: Operation, error: &BackendError) {
        (**self).fault(op, error)
    }
}
