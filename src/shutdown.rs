use crate::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shutdown_tx,
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        let mut components = self.components.lock().await;
        info!("Registering component '{}' for graceful shutdown", component.name());
        components.push(component);
    }

    /// Get a shutdown signal receiver
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Tell every subscriber to stop, without tearing components down yet.
    pub fn trigger(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("No subscribers for shutdown signal");
        }
    }

    /// Trigger shutdown and shut down all registered components in registration order.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.trigger();

        let components = self.components.lock().await;
        let shutdown_all = async {
            for component in components.iter() {
                info!("Shutting down component '{}'", component.name());
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", component.name()),
                    Err(e) => error!("Component '{}' shutdown failed: {}", component.name(), e),
                }
            }
        };

        match tokio::time::timeout(self.shutdown_timeout, shutdown_all).await {
            Ok(()) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Err(_) => {
                error!("Shutdown timeout exceeded, forcing exit");
                Err(crate::ScoreboardError::InvalidArgument(
                    "Shutdown timeout exceeded".to_string()
                ))
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Kafka producer shutdown component
pub struct KafkaProducerShutdown {
    producer: crate::KafkaProducer,
}

impl KafkaProducerShutdown {
    pub fn new(producer: crate::KafkaProducer) -> Self {
        Self { producer }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for KafkaProducerShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing Kafka producer...");
        self.producer.flush(Duration::from_secs(10)).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "kafka-producer"
    }
}

/// RocksDB store shutdown component
pub struct RocksDBShutdown {
    store: Arc<crate::RocksDBStore>,
}

impl RocksDBShutdown {
    pub fn new(store: Arc<crate::RocksDBStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for RocksDBShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing RocksDB store...");
        self.store.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "rocksdb-store"
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}
