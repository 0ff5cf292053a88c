//! Inbound incident messages.
//!
//! The pipeline only needs two things from the queue: the next decoded
//! message and an explicit commit once that message is fully processed.
//! Auto-commit stays off so a crash mid-pipeline redelivers the message.

use anyhow::{Context, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;

use crate::config::KafkaConfig;

/// One message as read from the topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Source of incident messages with caller-controlled offset commits.
#[async_trait::async_trait]
pub trait IncidentSource: Send {
    /// Next message, or `None` when the source is exhausted.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>>;

    /// Advance the offset past everything handed out so far.
    async fn commit(&mut self) -> Result<()>;
}

/// Kafka-backed [`IncidentSource`].
pub struct KafkaIncidentSource {
    consumer: StreamConsumer,
}

impl KafkaIncidentSource {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.servers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .context("failed to create kafka consumer")?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .context("failed to subscribe to incident topics")?;
        tracing::info!(topics = ?config.topics, group = %config.group_id, "kafka consumer subscribed");
        Ok(Self { consumer })
    }
}

#[async_trait::async_trait]
impl IncidentSource for KafkaIncidentSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>> {
        let message = self
            .consumer
            .recv()
            .await
            .context("kafka consume failed")?;
        Ok(Some(InboundMessage {
            topic: message.topic().to_string(),
            payload: message.payload().unwrap_or_default().to_vec(),
        }))
    }

    async fn commit(&mut self) -> Result<()> {
        self.consumer
            .commit_consumer_state(CommitMode::Async)
            .context("kafka offset commit failed")?;
        Ok(())
    }
}
