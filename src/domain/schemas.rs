// Topic naming convention shared by the game clients and the scoreboard
pub struct Topics;

impl Topics {
    pub const EVENT_TOPIC_SUFFIX: &'static str = "-event-topic";
    pub const SCORE_TOPIC_SUFFIX: &'static str = "-score-topic";
    /// librdkafka treats a subscription starting with `^` as a regex.
    pub const EVENT_TOPIC_PATTERN: &'static str = "^.*-event-topic$";
}

// State store definitions
pub struct Stores;

impl Stores {
    pub const SCORE: &'static str = "score-counters";
}

/// Room name of an event topic: everything before the last `-event-topic`.
pub fn room_name(event_topic: &str) -> Option<&str> {
    event_topic
        .rfind(Topics::EVENT_TOPIC_SUFFIX)
        .map(|i| &event_topic[..i])
}

/// Score topic paired with an event topic of the same room.
pub fn score_topic_name(event_topic: &str) -> Option<String> {
    room_name(event_topic).map(|room| format!("{}{}", room, Topics::SCORE_TOPIC_SUFFIX))
}

// Utility functions for key generation
pub fn counter_key(room: &str, killer: &str) -> String {
    format!("{}-{}", room, killer)
}
