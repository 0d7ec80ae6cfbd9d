use crate::{Result, ScoreboardError, ServiceConfig};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Prefix for environment variable overrides, e.g. `SCOREBOARD_BOOTSTRAP_SERVERS`.
pub const ENV_PREFIX: &str = "SCOREBOARD";

fn read_properties<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let file = File::open(&path).map_err(|e| {
        ScoreboardError::InvalidArgument(format!("Failed to open config file {:?}: {}", path.as_ref(), e))
    })?;

    let reader = BufReader::new(file);
    java_properties::read(reader)
        .map_err(|e| ScoreboardError::InvalidArgument(format!("Failed to parse properties: {}", e)))
}

// Known keys land in typed fields; the rest are passed to librdkafka
fn apply_property(config: &mut ServiceConfig, key: String, value: String) {
    match key.as_str() {
        "bootstrap.servers" => config.kafka.bootstrap_servers = value,
        "security.protocol" => config.kafka.security_protocol = Some(value),
        "sasl.mechanism" => config.kafka.sasl_mechanism = Some(value),
        "sasl.username" => config.kafka.sasl_username = Some(value),
        "sasl.password" => config.kafka.sasl_password = Some(value),
        "ssl.ca.location" => config.kafka.ssl_ca_location = Some(value),
        "processing.guarantee" => config.processing_guarantee = Some(value),
        "scoreboard.input.pattern" => config.input_topic_pattern = value,
        "scoreboard.publish.failure.policy" => config.publish_failure_policy = Some(value),
        _ => {
            config.kafka.additional_properties.insert(key, value);
        }
    }
}

/// Parse Java properties file into ServiceConfig
pub fn parse_properties_file<P: AsRef<Path>>(path: P, application_id: &str) -> Result<ServiceConfig> {
    merge_stream_properties(ServiceConfig::new(application_id), path)
}

/// Parse stream-specific properties file and merge with base config
pub fn merge_stream_properties<P: AsRef<Path>>(mut config: ServiceConfig, path: P) -> Result<ServiceConfig> {
    let properties = read_properties(path)?;

    for (key, value) in properties {
        apply_property(&mut config, key, value);
    }

    // Fail early on values the runtime would reject later
    config.guarantee()?;
    config.failure_policy()?;

    Ok(config)
}

/// Apply `SCOREBOARD_*` environment variables on top of a parsed config.
pub fn apply_env_overrides(mut config: ServiceConfig) -> Result<ServiceConfig> {
    let env = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;

    if let Ok(value) = env.get_string("bootstrap_servers") {
        config.kafka.bootstrap_servers = value;
    }
    if let Ok(value) = env.get_string("state_dir") {
        config.state_dir = value;
    }
    if let Ok(value) = env.get_string("processing_guarantee") {
        config.processing_guarantee = Some(value);
    }
    if let Ok(value) = env.get_string("input_pattern") {
        config.input_topic_pattern = value;
    }
    if let Ok(value) = env.get_string("publish_failure_policy") {
        config.publish_failure_policy = Some(value);
    }

    config.guarantee()?;
    config.failure_policy()?;

    Ok(config)
}
