//! # rmq Store Access Facade
//!
//! Purpose: Present one string/list/set capability set over any
//! `StoreBackend` (single node, cluster, in-process) and collapse each call's
//! error signal into a boolean or an `Option`.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Facade` hides the backend and its error type.
//! 2. **One Policy**: Every operation funnels its result through `settle`.
//! 3. **Injected Logging**: Faults go to a `FaultLog`, `tracing` by default.
//! 4. **Stateless Calls**: One backend call per operation; nothing is buffered.

mod facade;
mod fault;

pub use facade::{settle, Facade};
pub use fault::{fault_line, FaultLog, Operation, TracingFaultLog, LOG_PREFIX, LOG_TARGET};

pub use rmq_common::{BackendError, BackendResult, StoreBackend, Ttl};
