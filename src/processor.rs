use crate::{
    counter_key, room_name, score_topic_name, CounterStore, DeliveryContext, Elimination,
    EventMessage, Result, ScoreboardError, ScorePublisher,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why an event produced no score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnhandledType(String),
    SelfElimination,
    MissingSourceTopic,
    UnroutableTopic(String),
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnhandledType(_) => "unhandled_type",
            Self::SelfElimination => "self_elimination",
            Self::MissingSourceTopic => "missing_source_topic",
            Self::UnroutableTopic(_) => "unroutable_topic",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnhandledType(event_type) => write!(f, "unhandled event type {}", event_type),
            Self::SelfElimination => write!(f, "self elimination"),
            Self::MissingSourceTopic => write!(f, "source topic unavailable"),
            Self::UnroutableTopic(topic) => write!(f, "topic {} is not an event topic", topic),
        }
    }
}

/// A counter value ready to be sent to a room's score topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub topic: String,
    pub killer: String,
    pub counter_key: String,
    pub score: i64,
}

impl ScoreUpdate {
    pub fn value(&self) -> String {
        self.score.to_string()
    }
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Ignored(IgnoreReason),
    Published(ScoreUpdate),
    /// The counter moved but the score never reached the output topic.
    PublishFailed {
        update: ScoreUpdate,
        error: ScoreboardError,
    },
}

impl ProcessOutcome {
    pub fn update(&self) -> Option<&ScoreUpdate> {
        match self {
            Self::Ignored(_) => None,
            Self::Published(update) | Self::PublishFailed { update, .. } => Some(update),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Route {
    counter_key: String,
    output_topic: String,
}

/// Derive where a kill is counted and published, or why it is not.
fn route(kill: &Elimination, ctx: &DeliveryContext) -> std::result::Result<Route, IgnoreReason> {
    if kill.is_self_elimination() {
        return Err(IgnoreReason::SelfElimination);
    }

    let topic = ctx.topic().ok_or(IgnoreReason::MissingSourceTopic)?;
    let room = room_name(topic).ok_or_else(|| IgnoreReason::UnroutableTopic(topic.to_string()))?;
    let output_topic =
        score_topic_name(topic).ok_or_else(|| IgnoreReason::UnroutableTopic(topic.to_string()))?;

    Ok(Route {
        counter_key: counter_key(room, &kill.killer),
        output_topic,
    })
}

/// Counts kills per room and killer and publishes the running score.
///
/// Holds no counter state of its own: every value comes from the store.
pub struct ScoreboardProcessor<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
}

impl<S, P> Clone for ScoreboardProcessor<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S, P> ScoreboardProcessor<S, P>
where
    S: CounterStore,
    P: ScorePublisher,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle one event.
    ///
    /// Irrelevant events and unroutable topics come back as `Ignored`. A failed
    /// send comes back as `PublishFailed`, after the counter has moved. Errors
    /// are left for missing fields and state store faults.
    pub async fn process(&self, event: &EventMessage, ctx: &DeliveryContext) -> Result<ProcessOutcome> {
        if !event.is_elimination() {
            return Ok(self.ignore(IgnoreReason::UnhandledType(event.event_type.clone())));
        }

        let kill = Elimination::try_from(event)?;
        let route = match route(&kill, ctx) {
            Ok(route) => route,
            Err(reason) => return Ok(self.ignore(reason)),
        };

        let score = self
            .store
            .increment_and_get(&route.counter_key, 1, ctx.origin())?;

        let update = ScoreUpdate {
            topic: route.output_topic,
            killer: kill.killer,
            counter_key: route.counter_key,
            score,
        };

        match self
            .publisher
            .publish(&update.topic, &update.killer, &update.value())
            .await
        {
            Ok(()) => {
                info!("{} killed {}, {} now {}", update.killer, kill.victim, update.counter_key, score);
                Ok(ProcessOutcome::Published(update))
            }
            Err(e) => {
                warn!("Failed to publish score {} to {}: {}", update.counter_key, update.topic, e);
                Ok(ProcessOutcome::PublishFailed { update, error: e })
            }
        }
    }

    fn ignore(&self, reason: IgnoreReason) -> ProcessOutcome {
        debug!("Ignoring event: {}", reason);
        ProcessOutcome::Ignored(reason)
    }
}
