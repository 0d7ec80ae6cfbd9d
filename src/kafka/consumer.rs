use crate::{Result, ScoreboardError};
use rdkafka::consumer::{Consumer, ConsumerGroupMetadata, StreamConsumer};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let consumer: StreamConsumer = config.create()?;
        Ok(Self { consumer })
    }

    /// Topics starting with `^` are matched as regular expressions.
    pub fn subscribe(&self, topics: &[&str]) -> Result<()> {
        self.consumer.subscribe(topics)?;
        Ok(())
    }

    pub async fn recv_message(&self, timeout_duration: Duration) -> Result<Option<KafkaMessage>> {
        match timeout(timeout_duration, self.consumer.recv()).await {
            Ok(Ok(message)) => {
                let key = message.key()
                    .map(|k| String::from_utf8_lossy(k).to_string());

                // Raw bytes, so invalid UTF-8 fails decoding instead of being replaced
                let payload = message.payload().map(<[u8]>::to_vec);

                Ok(Some(KafkaMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    key,
                    payload,
                }))
            }
            Ok(Err(e)) => Err(ScoreboardError::Kafka(e)),
            Err(_) => Ok(None), // Timeout
        }
    }

    pub fn commit_message(&self, message: &KafkaMessage) -> Result<()> {
        let tpl = message.next_offset()?;
        self.consumer.commit(&tpl, rdkafka::consumer::CommitMode::Sync)?;
        Ok(())
    }

    /// Seek back so the message is delivered again.
    pub fn rewind(&self, message: &KafkaMessage) -> Result<()> {
        self.consumer.seek(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset),
            Duration::from_secs(5),
        )?;
        Ok(())
    }

    pub fn group_metadata(&self) -> Result<ConsumerGroupMetadata> {
        self.consumer.group_metadata().ok_or_else(|| {
            ScoreboardError::InvalidArgument("Consumer has no group metadata".to_string())
        })
    }
}

#[derive(Debug, Clone)]
pub struct KafkaMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl KafkaMessage {
    pub fn deserialize_value<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match &self.payload {
            Some(payload) => {
                let value = serde_json::from_slice(payload)?;
                Ok(value)
            }
            None => Err(ScoreboardError::InvalidArgument("Empty message payload".to_string())),
        }
    }

    /// Offset to commit once this message is done.
    pub fn next_offset(&self) -> Result<TopicPartitionList> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&self.topic, self.partition, Offset::Offset(self.offset + 1))?;
        Ok(tpl)
    }
}
