//! Queue access seams.
//!
//! The ingestion loop and the depth sampler only see these traits; the redis
//! implementation lives in [`redis`]. One connection per consumer, no pooling.

pub mod redis;

use async_trait::async_trait;

use logstash_exporter_core::error::Result;

pub use self::redis::{RedisConnection, RedisConnector};

/// One live broker connection.
#[async_trait]
pub trait QueueConnection: Send {
    /// Pop from the head of `queue`, waiting indefinitely. A well-formed reply
    /// is `[queue_name, payload]`; anything else is returned as-is for the
    /// caller to reject.
    async fn blocking_pop(&mut self, queue: &str) -> Result<Vec<String>>;

    /// Current length of `queue`.
    async fn length(&mut self, queue: &str) -> Result<i64>;
}

/// Opens authenticated connections.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn QueueConnection>>;
}
