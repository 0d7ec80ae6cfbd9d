use scoreboard::*;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_config_parsing_integration() {
    let config_content = r#"
bootstrap.servers=localhost:9092,localhost:9093
processing.guarantee=exactly_once_v2
security.protocol=PLAINTEXT
scoreboard.publish.failure.policy=propagate
fetch.min.bytes=1
"#;

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.properties");
    std::fs::write(&config_path, config_content).unwrap();

    let config = parse_properties_file(&config_path, "scoreboard").unwrap();

    assert_eq!(config.application_id, "scoreboard");
    assert_eq!(config.kafka.bootstrap_servers, "localhost:9092,localhost:9093");
    assert_eq!(config.kafka.security_protocol, Some("PLAINTEXT".to_string()));
    assert_eq!(config.input_topic_pattern, Topics::EVENT_TOPIC_PATTERN);
    assert_eq!(config.guarantee().unwrap(), ProcessingGuarantee::ExactlyOnce);
    assert_eq!(config.failure_policy().unwrap(), PublishFailurePolicy::Propagate);
    assert_eq!(config.kafka.additional_properties.get("fetch.min.bytes"), Some(&"1".to_string()));

    let stream_config_path = temp_dir.path().join("stream.properties");
    std::fs::write(&stream_config_path, "max.poll.interval.ms=600000\n").unwrap();

    let merged_config = merge_stream_properties(config, &stream_config_path).unwrap();
    assert_eq!(
        merged_config.kafka.additional_properties.get("max.poll.interval.ms"),
        Some(&"600000".to_string())
    );
}

#[tokio::test]
async fn test_config_defaults_and_rejections() {
    let temp_dir = tempdir().unwrap();

    let config_path = temp_dir.path().join("minimal.properties");
    std::fs::write(&config_path, "bootstrap.servers=broker:9092\n").unwrap();
    let config = parse_properties_file(&config_path, "scoreboard").unwrap();
    assert_eq!(config.guarantee().unwrap(), ProcessingGuarantee::ExactlyOnce);
    assert_eq!(config.failure_policy().unwrap(), PublishFailurePolicy::Suppress);

    let bad_path = temp_dir.path().join("bad.properties");
    std::fs::write(&bad_path, "processing.guarantee=at_most_once\n").unwrap();
    assert!(parse_properties_file(&bad_path, "scoreboard").is_err());

    assert!(parse_properties_file(temp_dir.path().join("missing.properties"), "scoreboard").is_err());
}

#[tokio::test]
async fn test_stream_properties_override_typed_fields() {
    let temp_dir = tempdir().unwrap();

    let config_path = temp_dir.path().join("client.properties");
    std::fs::write(&config_path, "bootstrap.servers=broker:9092\nprocessing.guarantee=exactly_once\n").unwrap();
    let config = parse_properties_file(&config_path, "scoreboard").unwrap();

    let stream_path = temp_dir.path().join("stream.properties");
    std::fs::write(
        &stream_path,
        "processing.guarantee=at_least_once\n\
         scoreboard.input.pattern=^arena-event-topic$\n\
         scoreboard.publish.failure.policy=propagate\n\
         max.poll.interval.ms=600000\n",
    )
    .unwrap();
    let merged = merge_stream_properties(config, &stream_path).unwrap();

    assert_eq!(merged.kafka.bootstrap_servers, "broker:9092");
    assert_eq!(merged.guarantee().unwrap(), ProcessingGuarantee::AtLeastOnce);
    assert_eq!(merged.failure_policy().unwrap(), PublishFailurePolicy::Propagate);
    assert_eq!(merged.input_topic_pattern, "^arena-event-topic$");
    assert!(!merged.kafka.additional_properties.contains_key("processing.guarantee"));
    assert!(!merged.kafka.additional_properties.contains_key("scoreboard.publish.failure.policy"));

    // Nothing scoreboard-specific reaches librdkafka
    let consumer = merged.to_consumer_config().unwrap();
    assert_eq!(consumer.get("processing.guarantee"), None);
    assert_eq!(consumer.get("scoreboard.input.pattern"), None);
    assert_eq!(consumer.get("max.poll.interval.ms"), Some("600000"));
    assert_eq!(consumer.get("isolation.level"), None);

    let bad_path = temp_dir.path().join("bad-stream.properties");
    std::fs::write(&bad_path, "scoreboard.publish.failure.policy=ignore\n").unwrap();
    assert!(merge_stream_properties(merged, &bad_path).is_err());
}

#[tokio::test]
async fn test_env_overrides() {
    std::env::set_var("SCOREBOARD_BOOTSTRAP_SERVERS", "env-broker:9092");
    std::env::set_var("SCOREBOARD_PROCESSING_GUARANTEE", "at_least_once");

    let config = apply_env_overrides(ServiceConfig::new("scoreboard")).unwrap();

    std::env::remove_var("SCOREBOARD_BOOTSTRAP_SERVERS");
    std::env::remove_var("SCOREBOARD_PROCESSING_GUARANTEE");

    assert_eq!(config.kafka.bootstrap_servers, "env-broker:9092");
    assert_eq!(config.guarantee().unwrap(), ProcessingGuarantee::AtLeastOnce);
}

#[tokio::test]
async fn test_service_config_to_kafka_config() {
    let mut service_config = ServiceConfig::new("scoreboard");
    service_config.kafka.sasl_mechanism = Some("PLAIN".to_string());

    let consumer = service_config.to_consumer_config().unwrap();
    assert_eq!(consumer.get("group.id"), Some("scoreboard"));
    assert_eq!(consumer.get("enable.auto.commit"), Some("false"));
    assert_eq!(consumer.get("isolation.level"), Some("read_committed"));
    assert_eq!(consumer.get("sasl.mechanism"), Some("PLAIN"));

    let producer = service_config.to_producer_config().unwrap();
    assert_eq!(producer.get("transactional.id"), Some("scoreboard-txn"));
    assert_eq!(producer.get("group.id"), None);

    service_config.processing_guarantee = Some("at_least_once".to_string());
    let consumer = service_config.to_consumer_config().unwrap();
    let producer = service_config.to_producer_config().unwrap();
    assert_eq!(consumer.get("isolation.level"), None);
    assert_eq!(producer.get("transactional.id"), None);
}

#[tokio::test]
async fn test_rocksdb_counters_survive_reopen() {
    let temp_dir = tempdir().unwrap();
    let store_path = temp_dir.path().join(Stores::SCORE);

    {
        let store = RocksDBStore::new(&store_path).unwrap();
        assert_eq!(store.counter("arena-alice").unwrap(), 0);
        assert_eq!(store.increment_and_get("arena-alice", 1, None).unwrap(), 1);
        assert_eq!(store.increment_and_get("arena-alice", 1, None).unwrap(), 2);
        assert_eq!(store.increment_and_get("arena-bob", 1, None).unwrap(), 1);
    }

    let store = RocksDBStore::new(&store_path).unwrap();
    assert_eq!(store.counter("arena-alice").unwrap(), 2);
    assert_eq!(store.counter("arena-bob").unwrap(), 1);
}

#[tokio::test]
async fn test_rocksdb_skips_applied_offsets() {
    let temp_dir = tempdir().unwrap();
    let store = RocksDBStore::new(temp_dir.path().join("counters")).unwrap();

    let origin = |offset| RecordOrigin {
        topic: "arena-event-topic",
        partition: 2,
        offset,
    };

    assert_eq!(store.increment_and_get("arena-alice", 1, Some(origin(10))).unwrap(), 1);
    assert_eq!(store.increment_and_get("arena-alice", 1, Some(origin(10))).unwrap(), 1);
    assert_eq!(store.increment_and_get("arena-alice", 1, Some(origin(9))).unwrap(), 1);
    assert_eq!(store.applied_offset("arena-event-topic", 2).unwrap(), Some(10));
    assert_eq!(store.applied_offset("arena-event-topic", 0).unwrap(), None);

    assert_eq!(store.increment_and_get("arena-alice", 1, Some(origin(11))).unwrap(), 2);
    assert_eq!(store.applied_offset("arena-event-topic", 2).unwrap(), Some(11));
}

#[tokio::test]
async fn test_counter_overflow_is_an_error() {
    let store = InMemoryCounterStore::new();
    store.increment_and_get("arena-alice", i64::MAX, None).unwrap();

    let err = store.increment_and_get("arena-alice", 1, None).unwrap_err();
    assert!(matches!(err, ScoreboardError::CounterOverflow(_)));
    assert_eq!(store.counter("arena-alice").unwrap(), i64::MAX);
}

#[tokio::test]
async fn test_rocksdb_backend_through_processor() {
    #[derive(Default)]
    struct NullPublisher;

    #[async_trait::async_trait]
    impl ScorePublisher for NullPublisher {
        async fn publish(&self, _topic: &str, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
    }

    let temp_dir = tempdir().unwrap();
    let backend = StateStoreBackend::new_rocksdb(temp_dir.path().join(Stores::SCORE)).unwrap();
    assert!(backend.rocksdb().is_some());

    let processor = ScoreboardProcessor::new(Arc::new(backend.clone()), Arc::new(NullPublisher));
    let ctx = DeliveryContext::for_topic("arena-event-topic").with_position(0, 5);

    let outcome = processor
        .process(&EventMessage::user_dead("bob", "alice"), &ctx)
        .await
        .unwrap();
    assert_eq!(outcome.update().unwrap().score, 1);

    // Redelivery of offset 5
    processor
        .process(&EventMessage::user_dead("bob", "alice"), &ctx)
        .await
        .unwrap();
    assert_eq!(backend.counter("arena-alice").unwrap(), 1);
    assert_eq!(backend.applied_offset("arena-event-topic", 0).unwrap(), Some(5));
}

#[tokio::test]
async fn test_event_message_wire_format() {
    let json = r#"{"type":"UserDeadEvent","name":"bob","avatar":"B","comment":"alice","x":3,"y":4,"alive":false,"list":[]}"#;
    let event: EventMessage = serde_json::from_str(json).unwrap();

    assert!(event.is_elimination());
    assert_eq!(event.name.as_deref(), Some("bob"));
    assert_eq!(event.comment.as_deref(), Some("alice"));
    assert_eq!(event, EventMessage { avatar: Some("B".to_string()), x: 3, y: 4, ..EventMessage::user_dead("bob", "alice") });

    let move_event: EventMessage = serde_json::from_str(r#"{"type":"UserMoveEvent","name":"bob"}"#).unwrap();
    assert!(!move_event.is_elimination());
    assert_eq!(move_event.comment, None);
}
