use crate::KafkaMessage;

/// What the runtime knows about the message being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryContext {
    topic: Option<String>,
    position: Option<(i32, i64)>,
}

/// Position of an input message, used to recognise redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOrigin<'a> {
    pub topic: &'a str,
    pub partition: i32,
    pub offset: i64,
}

impl DeliveryContext {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            position: None,
        }
    }

    pub fn without_topic() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.position = Some((partition, offset));
        self
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn origin(&self) -> Option<RecordOrigin<'_>> {
        let topic = self.topic.as_deref()?;
        let (partition, offset) = self.position?;
        Some(RecordOrigin { topic, partition, offset })
    }
}

impl From<&KafkaMessage> for DeliveryContext {
    fn from(message: &KafkaMessage) -> Self {
        let topic = Some(message.topic.clone()).filter(|t| !t.is_empty());
        Self {
            topic,
            position: Some((message.partition, message.offset)),
        }
    }
}
