//! # Client Configuration
//!
//! Connection settings for building a backend handle. The facade itself
//! never reads configuration; this is for callers assembling the handle.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a backend handle.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The store client rejected the node URL or failed to connect.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    /// The pool could not establish its initial connections.
    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// The configuration document could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
    /// The configuration file could not be read.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// `nodes` was empty.
    #[error("no store nodes configured")]
    NoNodes,
}

/// Deployment shape of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// One node; only the first entry of `nodes` is used.
    #[default]
    Single,
    /// A cluster; `nodes` are the seed nodes for topology discovery.
    Cluster,
}

/// Configuration for the backend handle and its pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub topology: Topology,
    /// Node URLs, e.g. "redis://127.0.0.1:6379/".
    pub nodes: Vec<String>,
    /// Maximum pooled connections (idle + in-use).
    pub max_size: u32,
    /// Idle connections the pool keeps open. `None` keeps `max_size`.
    pub min_idle: Option<u32>,
    /// Maximum wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: Option<u64>,
    /// Socket read timeout, in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Socket write timeout, in milliseconds.
    pub write_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            topology: Topology::Single,
            nodes: vec!["redis://127.0.0.1:6379/".to_string()],
            max_size: 16,
            min_idle: Some(1),
            connection_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Single-node configuration for `url` with default pool settings.
    pub fn single(url: impl Into<String>) -> Self {
        ClientConfig {
            nodes: vec![url.into()],
            ..ClientConfig::default()
        }
    }

    /// Cluster configuration seeded with `nodes`.
    pub fn cluster<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientConfig {
            topology: Topology::Cluster,
            nodes: nodes.into_iter().map(Into::into).collect(),
            ..ClientConfig::default()
        }
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConnectError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConnectError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Pool builder carrying the sizing and checkout timeout.
    pub(crate) fn pool_builder<M: r2d2::ManageConnection>(&self) -> r2d2::Builder<M> {
        let builder = r2d2::Pool::builder()
            .max_size(self.max_size.max(1))
            .min_idle(self.min_idle);
        match self.connection_timeout_ms {
            Some(ms) => builder.connection_timeout(Duration::from_millis(ms.max(1))),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn cluster_document_parses() {
        let config = ClientConfig::from_json(
            r#"{
                "topology": "cluster",
                "nodes": ["redis://10.0.0.1:7000", "redis://10.0.0.2:7000"],
                "max_size": 4,
                "read_timeout_ms": 250
            }"#,
        )
        .unwrap();

        assert_eq!(config.topology, Topology::Cluster);
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.write_timeout(), None);
    }

    #[test]
    fn unknown_topology_is_rejected() {
        let err = ClientConfig::from_json(r#"{"topology": "sentinel"}"#).unwrap_err();
        assert!(matches!(err, ConnectError::Config(_)));
    }

    #[test]
    fn constructors_set_topology() {
        assert_eq!(
            ClientConfig::single("redis://h:1").nodes,
            vec!["redis://h:1".to_string()]
        );
        let cluster = ClientConfig::cluster(["redis://a:1", "redis://b:1"]);
        assert_eq!(cluster.topology, Topology::Cluster);
        assert_eq!(cluster.nodes.len(), 2);
    }
}
