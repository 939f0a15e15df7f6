//! # rmq-engine
//!
//! In-process implementation of `StoreBackend` with Redis string, list, set
//! and TTL semantics.

mod memory;

pub use memory::MemoryBackend;
