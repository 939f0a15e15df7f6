//! # Shared Value Types

use std::time::Duration;

/// TTL state of an existing key, mirroring Redis `TTL` semantics.
///
/// A missing key is not a `Ttl`; backends report it as `BackendError::Nil`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl Ttl {
    /// Converts the Redis integer reply (`-2` missing, `-1` no expiry,
    /// otherwise seconds remaining).
    ///
    /// Returns `None` when the key is missing.
    pub fn from_seconds(value: i64) -> Option<Ttl> {
        match value {
            -1 => Some(Ttl::NoExpiry),
            v if v >= 0 => Some(Ttl::ExpiresIn(Duration::from_secs(v as u64))),
            _ => None,
        }
    }

    /// Returns the remaining lifetime, if any.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::NoExpiry => None,
            Ttl::ExpiresIn(left) => Some(*left),
        }
    }
}
