use crate::{
    retry_with_backoff, CounterStore, DeliveryContext, EventMessage, KafkaConsumer, KafkaMessage,
    KafkaProducer, Metrics, ProcessOutcome, ProcessingGuarantee, PublishFailurePolicy, Result,
    RetryConfig, ScoreboardError, ScoreboardProcessor, ScorePublisher, ServiceConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Fatal producer errors cannot be cleared by aborting the transaction.
pub fn is_fatal(error: &ScoreboardError) -> bool {
    matches!(error, ScoreboardError::FatalProducer(_))
}

/// Input that will never process no matter how often it is redelivered.
pub fn is_poison(error: &ScoreboardError) -> bool {
    matches!(
        error,
        ScoreboardError::Json(_)
            | ScoreboardError::MissingField(_)
            | ScoreboardError::InvalidArgument(_)
            | ScoreboardError::CounterOverflow(_)
    )
}

/// Turns a raw Kafka message into one processor invocation and applies the
/// publish failure policy to the result.
pub struct MessageHandler<S, P> {
    processor: ScoreboardProcessor<S, P>,
    policy: PublishFailurePolicy,
    retry: RetryConfig,
    metrics: Option<Metrics>,
}

impl<S, P> MessageHandler<S, P>
where
    S: CounterStore,
    P: ScorePublisher,
{
    pub fn new(processor: ScoreboardProcessor<S, P>, policy: PublishFailurePolicy) -> Self {
        Self {
            processor,
            policy,
            retry: RetryConfig::invocation(),
            metrics: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn processor(&self) -> &ScoreboardProcessor<S, P> {
        &self.processor
    }

    pub async fn handle(&self, message: &KafkaMessage) -> Result<ProcessOutcome> {
        let started = Instant::now();
        let result = self.invoke(message).await;

        if let Some(metrics) = &self.metrics {
            metrics.events_received.inc();
            match &result {
                Ok(outcome) => metrics.record_outcome(outcome, started.elapsed()),
                Err(_) => metrics.invocation_errors.inc(),
            }
        }

        result
    }

    async fn invoke(&self, message: &KafkaMessage) -> Result<ProcessOutcome> {
        let event: EventMessage = message.deserialize_value()?;
        let ctx = DeliveryContext::from(message);

        match self.policy {
            PublishFailurePolicy::Suppress => {
                let outcome = self.processor.process(&event, &ctx).await?;
                if let ProcessOutcome::PublishFailed { update, error } = &outcome {
                    warn!(
                        "Score {}={} was counted but not delivered to {}: {}",
                        update.counter_key, update.score, update.topic, error
                    );
                }
                Ok(outcome)
            }
            PublishFailurePolicy::Propagate => {
                // Re-invocations carry the same origin, so the store does not count them again
                let processor = &self.processor;
                let (event, ctx) = (&event, &ctx);
                retry_with_backoff(&self.retry, "score-invocation", move || async move {
                    match processor.process(event, ctx).await? {
                        ProcessOutcome::PublishFailed { update, error } => {
                            Err(ScoreboardError::PublishFailed {
                                topic: update.topic,
                                reason: error.to_string(),
                            })
                        }
                        outcome => Ok(outcome),
                    }
                })
                .await
            }
        }
    }
}

/// What happens to an input message once its invocation is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Commit,
    Redeliver,
}

/// A finished invocation is acknowledged, including one whose score was not
/// delivered. Poison input is acknowledged too; anything else goes back.
pub fn acknowledgement(message: &KafkaMessage, result: &Result<ProcessOutcome>) -> Acknowledgement {
    match result {
        Ok(_) => Acknowledgement::Commit,
        Err(e) if is_poison(e) => {
            error!(
                "Skipping malformed message {}/{}@{}: {}",
                message.topic, message.partition, message.offset, e
            );
            Acknowledgement::Commit
        }
        Err(e) => {
            error!(
                "Error processing message {}/{}@{}, redelivering: {}",
                message.topic, message.partition, message.offset, e
            );
            Acknowledgement::Redeliver
        }
    }
}

/// Consumer side of an acknowledgement.
pub trait InputLog: Send + Sync {
    fn commit(&self, message: &KafkaMessage) -> Result<()>;

    /// Seek back so the message is delivered again.
    fn rewind(&self, message: &KafkaMessage) -> Result<()>;
}

impl InputLog for KafkaConsumer {
    fn commit(&self, message: &KafkaMessage) -> Result<()> {
        self.commit_message(message)
    }

    fn rewind(&self, message: &KafkaMessage) -> Result<()> {
        KafkaConsumer::rewind(self, message)
    }
}

/// Producer transactions that carry the consumed offset with the scores.
pub trait OffsetTransactions: Send + Sync {
    fn begin(&self) -> Result<()>;

    fn commit(&self, message: &KafkaMessage) -> Result<()>;

    fn abort(&self) -> Result<()>;
}

pub struct KafkaTransactions {
    producer: KafkaProducer,
    consumer: Arc<KafkaConsumer>,
}

impl KafkaTransactions {
    pub fn new(producer: KafkaProducer, consumer: Arc<KafkaConsumer>) -> Self {
        Self { producer, consumer }
    }
}

impl OffsetTransactions for KafkaTransactions {
    fn begin(&self) -> Result<()> {
        self.producer.begin_transaction()
    }

    fn commit(&self, message: &KafkaMessage) -> Result<()> {
        self.producer
            .send_offsets_to_transaction(&message.next_offset()?, &self.consumer.group_metadata()?)?;
        self.producer.commit_transaction()
    }

    fn abort(&self) -> Result<()> {
        self.producer.abort_transaction()
    }
}

/// Applies acknowledgements under the processing guarantee in use.
///
/// With transactions, every failure other than a fatal producer error aborts
/// the open transaction and rewinds the input. Only fatal errors are returned
/// to the caller.
pub struct InputAcknowledger<L, T> {
    input: Arc<L>,
    transactions: Option<T>,
    redelivery_delay: Duration,
}

impl<L, T> InputAcknowledger<L, T>
where
    L: InputLog,
    T: OffsetTransactions,
{
    pub fn at_least_once(input: Arc<L>) -> Self {
        Self {
            input,
            transactions: None,
            redelivery_delay: Duration::from_secs(1),
        }
    }

    pub fn exactly_once(input: Arc<L>, transactions: T) -> Self {
        Self {
            transactions: Some(transactions),
            ..Self::at_least_once(input)
        }
    }

    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    /// Opens the transaction for `message`. Returns false when that failed and
    /// the message was rewound instead.
    pub async fn open(&self, message: &KafkaMessage) -> Result<bool> {
        let Some(transactions) = &self.transactions else {
            return Ok(true);
        };

        match transactions.begin() {
            Ok(()) => Ok(true),
            Err(e) if is_fatal(&e) => Err(e),
            Err(e) => {
                warn!(
                    "Could not begin transaction for {}/{}@{}: {}",
                    message.topic, message.partition, message.offset, e
                );
                self.abort_and_redeliver(transactions, message).await?;
                Ok(false)
            }
        }
    }

    pub async fn settle(&self, message: &KafkaMessage, acknowledgement: Acknowledgement) -> Result<()> {
        match (&self.transactions, acknowledgement) {
            (Some(transactions), Acknowledgement::Commit) => match transactions.commit(message) {
                Ok(()) => Ok(()),
                Err(e) if is_fatal(&e) => Err(e),
                Err(e) => {
                    warn!(
                        "Transaction for {}/{}@{} did not commit, aborting: {}",
                        message.topic, message.partition, message.offset, e
                    );
                    self.abort_and_redeliver(transactions, message).await
                }
            },
            (Some(transactions), Acknowledgement::Redeliver) => {
                self.abort_and_redeliver(transactions, message).await
            }
            (None, Acknowledgement::Commit) => {
                if let Err(e) = self.input.commit(message) {
                    error!("Error committing message: {}", e);
                }
                Ok(())
            }
            (None, Acknowledgement::Redeliver) => self.redeliver(message).await,
        }
    }

    async fn abort_and_redeliver(&self, transactions: &T, message: &KafkaMessage) -> Result<()> {
        match transactions.abort() {
            Ok(()) => {}
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => warn!("Abort failed: {}", e),
        }
        self.redeliver(message).await
    }

    async fn redeliver(&self, message: &KafkaMessage) -> Result<()> {
        tokio::time::sleep(self.redelivery_delay).await;
        self.input.rewind(message)
    }
}

/// Consume loop around the scoreboard processor.
pub struct ScoreboardRuntime<S> {
    consumer: Arc<KafkaConsumer>,
    producer: KafkaProducer,
    handler: MessageHandler<S, KafkaProducer>,
    acknowledger: InputAcknowledger<KafkaConsumer, KafkaTransactions>,
    poll_timeout: Duration,
}

impl<S: CounterStore> ScoreboardRuntime<S> {
    pub fn new(config: &ServiceConfig, store: Arc<S>, metrics: Metrics) -> Result<Self> {
        let guarantee = config.guarantee()?;
        let policy = config.failure_policy()?;

        let consumer = Arc::new(KafkaConsumer::new(config.to_consumer_config()?)?);
        let producer = KafkaProducer::new(config.to_producer_config()?)?;

        consumer.subscribe(&[config.input_topic_pattern.as_str()])?;

        let acknowledger = match guarantee {
            ProcessingGuarantee::ExactlyOnce => {
                producer.init_transactions()?;
                let transactions = KafkaTransactions::new(producer.clone(), Arc::clone(&consumer));
                InputAcknowledger::exactly_once(Arc::clone(&consumer), transactions)
            }
            ProcessingGuarantee::AtLeastOnce => InputAcknowledger::at_least_once(Arc::clone(&consumer)),
        };

        let processor = ScoreboardProcessor::new(store, Arc::new(producer.clone()));
        let handler = MessageHandler::new(processor, policy).with_metrics(metrics);

        info!(
            "Subscribed to {} with {} processing, publish failures: {:?}",
            config.input_topic_pattern, guarantee, policy
        );

        Ok(Self {
            consumer,
            producer,
            handler,
            acknowledger,
            poll_timeout: Duration::from_millis(100),
        })
    }

    pub fn producer(&self) -> KafkaProducer {
        self.producer.clone()
    }

    /// Runs until shutdown. Returns early only on consumer errors and fatal
    /// producer errors.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("Scoreboard is running...");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }

                message_result = self.consumer.recv_message(self.poll_timeout) => {
                    match message_result? {
                        Some(message) => self.dispatch(&message).await?,
                        None => continue,
                    }
                }
            }
        }

        info!("Scoreboard shutting down...");
        Ok(())
    }

    async fn dispatch(&self, message: &KafkaMessage) -> Result<()> {
        if !self.acknowledger.open(message).await? {
            return Ok(());
        }

        let result = self.handler.handle(message).await;
        self.acknowledger
            .settle(message, acknowledgement(message, &result))
            .await
    }
}
