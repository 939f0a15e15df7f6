//! # rmq Redis Adapters
//!
//! Purpose: Back the store facade with a real Redis deployment, either a
//! single node or a cluster, through the `redis` crate and an `r2d2` pool.
//!
//! ## Design Principles
//! 1. **Thin Adapter**: One pooled checkout and one command per primitive.
//! 2. **Caller-Owned Handle**: Pools can be built here from a `ClientConfig` or
//!    handed in ready-made via `RedisBackend::from_pool`.
//! 3. **One Implementation**: Both topologies share `RedisBackend<M>`.

mod backend;
mod config;

use rmq_common::StoreBackend;
use rmq_store::Facade;

pub use backend::{Clustered, RedisBackend, SingleNode};
pub use config::{ClientConfig, ConnectError, Topology};

/// Connects to the topology named in `config`.
pub fn connect(config: &ClientConfig) -> Result<Box<dyn StoreBackend>, ConnectError> {
    Ok(match config.topology {
        Topology::Single => Box::new(SingleNode::connect(config)?),
        Topology::Cluster => Box::new(Clustered::connect(config)?),
    })
}

/// Connects and wraps the backend in a `Facade` logging through `tracing`.
pub fn open(config: &ClientConfig) -> Result<Facade<Box<dyn StoreBackend>>, ConnectError> {
    connect(config).map(Facade::new)
}
