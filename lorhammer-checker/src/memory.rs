//! In-process broker with topic/shard semantics.
//!
//! Used for local runs and tests. Messages published to a shard nobody is
//! consuming are discarded, matching a newest-offset subscription.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::source::{Connector, ShardConsumer, ShardSession};
use crate::SourceError;

#[derive(Default)]
struct ShardSlot {
    sender: Option<mpsc::UnboundedSender<Bytes>>,
}

impl ShardSlot {
    fn is_consumed(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

type Topics = HashMap<String, Vec<ShardSlot>>;

/// Cloneable handle; every clone sees the same topics.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    topics: Arc<Mutex<Topics>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `topic` with shards named `"0"` to `"<shards - 1>"`.
    pub fn create_topic(&self, topic: &str, shards: usize) {
        let slots = (0..shards).map(|_| ShardSlot::default()).collect();
        self.topics.lock().insert(topic.to_string(), slots);
    }

    /// Returns whether a live consumer received the message.
    pub fn publish(
        &self,
        topic: &str,
        shard: usize,
        payload: impl Into<Bytes>,
    ) -> Result<bool, SourceError> {
        let topics = self.topics.lock();
        let slot = slot(&topics, topic, shard)?;
        match &slot.sender {
            Some(tx) => Ok(tx.send(payload.into()).is_ok()),
            None => Ok(false),
        }
    }

    /// Ends every open consumer of `topic`.
    pub fn close_topic(&self, topic: &str) {
        if let Some(slots) = self.topics.lock().get_mut(topic) {
            for slot in slots {
                slot.sender = None;
            }
        }
    }

    pub fn is_consumed(&self, topic: &str, shard: usize) -> bool {
        let topics = self.topics.lock();
        slot(&topics, topic, shard).is_ok_and(ShardSlot::is_consumed)
    }
}

fn slot<'a>(topics: &'a Topics, topic: &str, shard: usize) -> Result<&'a ShardSlot, SourceError> {
    topics
        .get(topic)
        .ok_or_else(|| SourceError::UnknownTopic(topic.to_string()))?
        .get(shard)
        .ok_or_else(|| SourceError::UnknownShard {
            topic: topic.to_string(),
            shard: shard.to_string(),
        })
}

#[async_trait]
impl Connector for MemoryBroker {
    async fn connect(&self, addresses: &[String]) -> Result<Box<dyn ShardSession>, SourceError> {
        debug!(?addresses, "Connected to in-process broker");
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ShardSession for MemoryBroker {
    async fn shards(&self, topic: &str) -> Result<Vec<String>, SourceError> {
        let topics = self.topics.lock();
        let slots = topics
            .get(topic)
            .ok_or_else(|| SourceError::UnknownTopic(topic.to_string()))?;
        Ok((0..slots.len()).map(|i| i.to_string()).collect())
    }

    async fn open(
        &self,
        topic: &str,
        shard: &str,
    ) -> Result<Box<dyn ShardConsumer>, SourceError> {
        let unknown = || SourceError::UnknownShard {
            topic: topic.to_string(),
            shard: shard.to_string(),
        };
        let index: usize = shard.parse().map_err(|_| unknown())?;

        let mut topics = self.topics.lock();
        let slot = topics
            .get_mut(topic)
            .ok_or_else(|| SourceError::UnknownTopic(topic.to_string()))?
            .get_mut(index)
            .ok_or_else(unknown)?;
        if slot.is_consumed() {
            return Err(SourceError::ShardBusy {
                topic: topic.to_string(),
                shard: shard.to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        slot.sender = Some(tx);
        Ok(Box::new(MemoryConsumer { rx }))
    }
}

struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl ShardConsumer for MemoryConsumer {
    async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_consumer_is_dropped() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 1);
        assert!(!broker.publish("t", 0, "lost").unwrap());

        let mut consumer = broker.open("t", "0").await.unwrap();
        assert!(broker.publish("t", 0, "kept").unwrap());
        assert_eq!(consumer.recv().await.unwrap(), Bytes::from("kept"));
    }

    #[tokio::test]
    async fn test_shard_released_on_drop() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 2);
        let consumer = broker.open("t", "1").await.unwrap();
        assert!(broker.is_consumed("t", 1));
        assert!(matches!(
            broker.open("t", "1").await,
            Err(SourceError::ShardBusy { .. })
        ));

        drop(consumer);
        assert!(!broker.is_consumed("t", 1));
        assert!(broker.open("t", "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_topic_and_shard() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 1);
        assert!(matches!(
            broker.shards("missing").await,
            Err(SourceError::UnknownTopic(_))
        ));
        assert!(matches!(
            broker.open("t", "7").await,
            Err(SourceError::UnknownShard { .. })
        ));
        assert!(matches!(
            broker.publish("t", 3, "x"),
            Err(SourceError::UnknownShard { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_topic_ends_consumers() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 1);
        let mut consumer = broker.open("t", "0").await.unwrap();
        broker.close_topic("t");
        assert!(consumer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shard_names() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 3);
        assert_eq!(broker.shards("t").await.unwrap(), vec!["0", "1", "2"]);
    }
}
