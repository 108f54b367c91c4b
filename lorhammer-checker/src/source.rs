//! Seams between the checker and the message-streaming backend.
//!
//! A [`Connector`] yields a [`ShardSession`] bound to a set of broker
//! addresses. The session resolves the shards of a topic and opens one
//! [`ShardConsumer`] per shard. Dropping a consumer releases its shard;
//! dropping the session closes the connection.

use async_trait::async_trait;
use bytes::Bytes;

use crate::SourceError;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addresses: &[String]) -> Result<Box<dyn ShardSession>, SourceError>;
}

#[async_trait]
pub trait ShardSession: Send + Sync {
    /// Shard identifiers of `topic`, in backend order.
    async fn shards(&self, topic: &str) -> Result<Vec<String>, SourceError>;

    /// Subscribes to newly produced messages only.
    async fn open(&self, topic: &str, shard: &str)
        -> Result<Box<dyn ShardConsumer>, SourceError>;
}

#[async_trait]
pub trait ShardConsumer: Send {
    /// Next message payload, or `None` once the shard is closed.
    async fn recv(&mut self) -> Option<Bytes>;
}
