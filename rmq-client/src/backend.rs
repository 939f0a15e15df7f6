//! # Redis Backend
//!
//! `StoreBackend` over a pooled `redis` connection. The pool's connection
//! type decides the topology: `redis::Connection` talks to one node,
//! `redis::cluster::ClusterConnection` routes by slot.

use std::time::Duration;

use r2d2::{CustomizeConnection, ManageConnection, Pool};
use redis::cluster::{ClusterClient, ClusterClientBuilder, ClusterConnection};
use redis::{Cmd, ConnectionLike, FromRedisValue, RedisError};
use tracing::debug;

use rmq_common::{BackendError, BackendResult, StoreBackend, Ttl};

use crate::config::{ClientConfig, ConnectError};

/// Backend handle over an `r2d2` pool of Redis connections.
pub struct RedisBackend<M: ManageConnection> {
    pool: Pool<M>,
}

/// Single-node deployment.
pub type SingleNode = RedisBackend<redis::Client>;

/// Cluster deployment.
///
/// `rpoplpush` is atomic only when both keys share a hash slot (use hash
/// tags such as `{queue}:ready`); otherwise the store rejects it with
/// `CROSSSLOT`.
pub type Clustered = RedisBackend<ClusterClient>;

impl<M> RedisBackend<M>
where
    M: ManageConnection<Error = RedisError>,
    M::Connection: ConnectionLike,
{
    /// Wraps a pool the caller already built.
    pub fn from_pool(pool: Pool<M>) -> Self {
        RedisBackend { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Checks out one connection and runs one command on it.
    fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> BackendResult<T> {
        let mut conn = self.pool.get().map_err(BackendError::client)?;
        cmd.query(&mut *conn).map_err(BackendError::client)
    }
}

impl SingleNode {
    /// Builds a pool for the first node in `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, ConnectError> {
        let url = config.nodes.first().ok_or(ConnectError::NoNodes)?;
        let client = redis::Client::open(url.as_str())?;
        let pool = config
            .pool_builder()
            .connection_customizer(Box::new(SocketTimeouts::from(config)))
            .build(client)?;
        debug!(node = %url, max_size = pool.max_size(), "single-node pool ready");
        Ok(Self::from_pool(pool))
    }
}

impl Clustered {
    /// Builds a pool of cluster connections seeded with `config.nodes`.
    pub fn connect(config: &ClientConfig) -> Result<Self, ConnectError> {
        if config.nodes.is_empty() {
            return Err(ConnectError::NoNodes);
        }
        let client = ClusterClientBuilder::new(config.nodes.clone()).build()?;
        let pool = config
            .pool_builder()
            .connection_customizer(Box::new(SocketTimeouts::from(config)))
            .build(client)?;
        debug!(nodes = ?config.nodes, max_size = pool.max_size(), "cluster pool ready");
        Ok(Self::from_pool(pool))
    }
}

impl<M> StoreBackend for RedisBackend<M>
where
    M: ManageConnection<Error = RedisError>,
    M::Connection: ConnectionLike,
{
    fn set(&self, key: &str, value: &str, expiration: Duration) -> BackendResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some((unit, amount)) = expiry_arg(expiration) {
            cmd.arg(unit).arg(amount);
        }
        self.query(&cmd)
    }

    fn del(&self, key: &str) -> BackendResult<u64> {
        self.query(redis::cmd("DEL").arg(key))
    }

    fn ttl(&self, key: &str) -> BackendResult<Ttl> {
        let seconds: i64 = self.query(redis::cmd("TTL").arg(key))?;
        Ttl::from_seconds(seconds).ok_or(BackendError::Nil)
    }

    fn lpush(&self, key: &str, value: &str) -> BackendResult<u64> {
        self.query(redis::cmd("LPUSH").arg(key).arg(value))
    }

    fn llen(&self, key: &str) -> BackendResult<u64> {
        self.query(redis::cmd("LLEN").arg(key))
    }

    fn lrem(&self, key: &str, count: i64, value: &str) -> BackendResult<u64> {
        self.query(redis::cmd("LREM").arg(key).arg(count).arg(value))
    }

    fn ltrim(&self, key: &str, start: i64, stop: i64) -> BackendResult<()> {
        self.query(redis::cmd("LTRIM").arg(key).arg(start).arg(stop))
    }

    fn rpoplpush(&self, source: &str, destination: &str) -> BackendResult<String> {
        let value: Option<String> =
            self.query(redis::cmd("RPOPLPUSH").arg(source).arg(destination))?;
        value.ok_or(BackendError::Nil)
    }

    fn sadd(&self, key: &str, value: &str) -> BackendResult<u64> {
        self.query(redis::cmd("SADD").arg(key).arg(value))
    }

    fn smembers(&self, key: &str) -> BackendResult<Vec<String>> {
        self.query(redis::cmd("SMEMBERS").arg(key))
    }

    fn srem(&self, key: &str, value: &str) -> BackendResult<u64> {
        self.query(redis::cmd("SREM").arg(key).arg(value))
    }

    fn flushdb(&self) -> BackendResult<()> {
        self.query(&redis::cmd("FLUSHDB"))
    }
}

/// Applies socket timeouts to each new pooled connection.
#[derive(Debug, Clone, Copy)]
struct SocketTimeouts {
    read: Option<Duration>,
    write: Option<Duration>,
}

impl From<&ClientConfig> for SocketTimeouts {
    fn from(config: &ClientConfig) -> Self {
        SocketTimeouts {
            read: config.read_timeout(),
            write: config.write_timeout(),
        }
    }
}

impl CustomizeConnection<redis::Connection, RedisError> for SocketTimeouts {
    fn on_acquire(&self, conn: &mut redis::Connection) -> Result<(), RedisError> {
        conn.set_read_timeout(self.read)?;
        conn.set_write_timeout(self.write)
    }
}

impl CustomizeConnection<ClusterConnection, RedisError> for SocketTimeouts {
    fn on_acquire(&self, conn: &mut ClusterConnection) -> Result<(), RedisError> {
        conn.set_read_timeout(self.read)?;
        conn.set_write_timeout(self.write)
    }
}

/// Chooses the `SET` expiration option: whole seconds go as `EX`, anything
/// finer as `PX` (at least one millisecond). Zero means no option.
fn expiry_arg(expiration: Duration) -> Option<(&'static str, u64)> {
    if expiration.is_zero() {
        return None;
    }
    if expiration.subsec_nanos() == 0 {
        return Some(("EX", expiration.as_secs()));
    }
    let millis = expiration.as_millis().max(1);
    Some(("PX", u64::try_from(millis).unwrap_or(u64::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_expiration_sends_no_option() {
        assert_eq!(expiry_arg(Duration::ZERO), None);
    }

    #[test]
    fn whole_seconds_use_ex() {
        assert_eq!(expiry_arg(Duration::from_secs(10)), Some(("EX", 10)));
    }

    #[test]
    fn sub_second_precision_uses_px() {
        assert_eq!(expiry_arg(Duration::from_millis(1500)), Some(("PX", 1500)));
        assert_eq!(expiry_arg(Duration::from_millis(20)), Some(("PX", 20)));
        assert_eq!(expiry_arg(Duration::from_micros(10)), Some(("PX", 1)));
    }

    #[test]
    fn missing_nodes_fail_fast() {
        let config = ClientConfig {
            nodes: Vec::new(),
            ..ClientConfig::default()
        };
        assert!(matches!(SingleNode::connect(&config), Err(ConnectError::NoNodes)));
        assert!(matches!(Clustered::connect(&config), Err(ConnectError::NoNodes)));
    }
}
