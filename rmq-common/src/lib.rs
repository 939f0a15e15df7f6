// rmq-common - Shared vocabulary for the rmq store access layer
//
// This crate defines the backend capability trait and the error/TTL types
// every backend and the facade agree on.

pub mod backend;
pub mod error;
pub mod types;

// Re-export for convenience
pub use backend::*;
pub use error::*;
pub use types::*;
