//! NATS JetStream backend.
//!
//! A topic is a JetStream stream and its shards are the subjects the stream
//! binds. Each shard gets an ephemeral pull consumer that only delivers
//! messages published after it was created.

use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::source::{Connector, ShardConsumer, ShardSession};
use crate::SourceError;

#[derive(Debug, Default, Clone, Copy)]
pub struct NatsConnector;

#[async_trait]
impl Connector for NatsConnector {
    async fn connect(&self, addresses: &[String]) -> Result<Box<dyn ShardSession>, SourceError> {
        let servers = addresses.join(",");
        info!(%servers, "Connecting to NATS");
        let client = async_nats::ConnectOptions::new()
            .connect(servers.as_str())
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;
        Ok(Box::new(NatsSession {
            jetstream: jetstream::new(client),
        }))
    }
}

struct NatsSession {
    jetstream: jetstream::Context,
}

#[async_trait]
impl ShardSession for NatsSession {
    async fn shards(&self, topic: &str) -> Result<Vec<String>, SourceError> {
        let stream = self
            .jetstream
            .get_stream(topic)
            .await
            .map_err(|e| SourceError::Backend(format!("stream '{topic}': {e}")))?;
        let subjects = stream.cached_info().config.subjects.clone();
        if subjects.is_empty() {
            return Err(SourceError::UnknownTopic(topic.to_string()));
        }
        Ok(subjects)
    }

    async fn open(
        &self,
        topic: &str,
        shard: &str,
    ) -> Result<Box<dyn ShardConsumer>, SourceError> {
        let consumer = self
            .jetstream
            .create_consumer_on_stream(
                pull::Config {
                    filter_subject: shard.to_string(),
                    deliver_policy: DeliverPolicy::New,
                    ack_policy: AckPolicy::None,
                    ..Default::default()
                },
                topic,
            )
            .await
            .map_err(|e| SourceError::Backend(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| SourceError::Backend(e.to_string()))?;
        debug!(topic, shard, "Opened JetStream consumer");

        let shard_name = shard.to_string();
        let payloads = messages
            .filter_map(move |result| {
                let payload = match result {
                    Ok(message) => Some(message.message.payload.clone()),
                    Err(e) => {
                        warn!(shard = %shard_name, error = %e, "Error receiving message");
                        None
                    }
                };
                async move { payload }
            })
            .boxed();
        Ok(Box::new(NatsConsumer { payloads }))
    }
}

struct NatsConsumer {
    payloads: BoxStream<'static, Bytes>,
}

#[async_trait]
impl ShardConsumer for NatsConsumer {
    async fn recv(&mut self) -> Option<Bytes> {
        self.payloads.next().await
    }
}
