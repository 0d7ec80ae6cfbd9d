use crate::{Result, ScoreboardError, Topics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub ssl_ca_location: Option<String>,
    pub additional_properties: HashMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            ssl_ca_location: None,
            additional_properties: HashMap::new(),
        }
    }
}

/// Delivery guarantee the runtime enforces around each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingGuarantee {
    AtLeastOnce,
    ExactlyOnce,
}

impl FromStr for ProcessingGuarantee {
    type Err = ScoreboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "at_least_once" => Ok(Self::AtLeastOnce),
            "exactly_once" | "exactly_once_v2" | "effectively_once" => Ok(Self::ExactlyOnce),
            other => Err(ScoreboardError::InvalidArgument(format!(
                "Unknown processing guarantee: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProcessingGuarantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeastOnce => write!(f, "at_least_once"),
            Self::ExactlyOnce => write!(f, "exactly_once"),
        }
    }
}

/// What the runtime does when a score could not be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishFailurePolicy {
    /// Log and acknowledge the input anyway. The counter may run ahead of what consumers saw.
    Suppress,
    /// Fail the invocation so the input is re-invoked and not acknowledged.
    Propagate,
}

impl FromStr for PublishFailurePolicy {
    type Err = ScoreboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "suppress" => Ok(Self::Suppress),
            "propagate" => Ok(Self::Propagate),
            other => Err(ScoreboardError::InvalidArgument(format!(
                "Unknown publish failure policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub application_id: String,
    pub state_dir: String,
    pub kafka: KafkaConfig,
    pub input_topic_pattern: String,
    pub processing_guarantee: Option<String>,
    pub publish_failure_policy: Option<String>,
}

impl ServiceConfig {
    pub fn new(application_id: &str) -> Self {
        Self {
            application_id: application_id.to_string(),
            state_dir: "/tmp/scoreboard".to_string(),
            kafka: KafkaConfig::default(),
            input_topic_pattern: Topics::EVENT_TOPIC_PATTERN.to_string(),
            processing_guarantee: None,
            publish_failure_policy: None,
        }
    }

    /// Effectively-once unless configured otherwise.
    pub fn guarantee(&self) -> Result<ProcessingGuarantee> {
        match &self.processing_guarantee {
            Some(value) => value.parse(),
            None => Ok(ProcessingGuarantee::ExactlyOnce),
        }
    }

    pub fn failure_policy(&self) -> Result<PublishFailurePolicy> {
        match &self.publish_failure_policy {
            Some(value) => value.parse(),
            None => Ok(PublishFailurePolicy::Suppress),
        }
    }

    fn base_client_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config.set("bootstrap.servers", &self.kafka.bootstrap_servers);

        if let Some(security_protocol) = &self.kafka.security_protocol {
            config.set("security.protocol", security_protocol);
        }

        if let Some(sasl_mechanism) = &self.kafka.sasl_mechanism {
            config.set("sasl.mechanism", sasl_mechanism);
        }

        if let Some(sasl_username) = &self.kafka.sasl_username {
            config.set("sasl.username", sasl_username);
        }

        if let Some(sasl_password) = &self.kafka.sasl_password {
            config.set("sasl.password", sasl_password);
        }

        if let Some(ssl_ca_location) = &self.kafka.ssl_ca_location {
            config.set("ssl.ca.location", ssl_ca_location);
        }

        config
    }

    pub fn to_consumer_config(&self) -> Result<rdkafka::ClientConfig> {
        let mut config = self.base_client_config();

        config.set("group.id", &self.application_id);
        config.set("auto.offset.reset", "earliest");
        config.set("enable.auto.commit", "false");
        // New room topics only show up on metadata refresh
        config.set("topic.metadata.refresh.interval.ms", "10000");

        if self.guarantee()? == ProcessingGuarantee::ExactlyOnce {
            config.set("isolation.level", "read_committed");
        }

        for (key, value) in &self.kafka.additional_properties {
            config.set(key, value);
        }

        Ok(config)
    }

    pub fn to_producer_config(&self) -> Result<rdkafka::ClientConfig> {
        let mut config = self.base_client_config();

        config.set("enable.idempotence", "true");

        if self.guarantee()? == ProcessingGuarantee::ExactlyOnce {
            config.set("transactional.id", format!("{}-txn", self.application_id));
        }

        for (key, value) in &self.kafka.additional_properties {
            config.set(key, value);
        }

        Ok(config)
    }
}
