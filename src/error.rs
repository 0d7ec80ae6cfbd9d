use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreboardError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Missing field in event: {0}")]
    MissingField(&'static str),

    #[error("Counter overflow for key: {0}")]
    CounterOverflow(String),

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Failed to publish score to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Fatal producer error: {0}")]
    FatalProducer(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ScoreboardError>;
