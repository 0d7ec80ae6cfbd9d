use crate::{Result, ScoreboardError};
use async_trait::async_trait;
use rdkafka::consumer::ConsumerGroupMetadata;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::{ClientConfig, TopicPartitionList};
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

// A fatal transaction error leaves the producer unusable until it is recreated
fn transaction_error(error: KafkaError) -> ScoreboardError {
    match &error {
        KafkaError::Transaction(e) if e.is_fatal() => ScoreboardError::FatalProducer(e.to_string()),
        _ => ScoreboardError::Kafka(error),
    }
}

/// Sends a score to an output topic.
#[async_trait]
pub trait ScorePublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let producer: FutureProducer = config.create()?;
        Ok(Self { producer })
    }

    /// Send a plain-text value, no JSON encoding.
    pub async fn send_text(&self, topic: &str, key: &str, value: &str) -> Result<()> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(value);

        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(kafka_err, _)| ScoreboardError::Kafka(kafka_err))?;

        Ok(())
    }

    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }

    pub fn init_transactions(&self) -> Result<()> {
        self.producer.init_transactions(TRANSACTION_TIMEOUT).map_err(transaction_error)?;
        Ok(())
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.producer.begin_transaction().map_err(transaction_error)?;
        Ok(())
    }

    /// Commit the consumer offsets as part of the open transaction.
    pub fn send_offsets_to_transaction(
        &self,
        offsets: &TopicPartitionList,
        group: &ConsumerGroupMetadata,
    ) -> Result<()> {
        self.producer
            .send_offsets_to_transaction(offsets, group, TRANSACTION_TIMEOUT)
            .map_err(transaction_error)?;
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.producer.commit_transaction(TRANSACTION_TIMEOUT).map_err(transaction_error)?;
        Ok(())
    }

    pub fn abort_transaction(&self) -> Result<()> {
        self.producer.abort_transaction(TRANSACTION_TIMEOUT).map_err(transaction_error)?;
        Ok(())
    }
}

#[async_trait]
impl ScorePublisher for KafkaProducer {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<()> {
        self.send_text(topic, key, value).await
    }
}
