use clap::Parser;
use scoreboard::{
    apply_env_overrides, merge_stream_properties, parse_properties_file, shutdown_signal,
    KafkaProducerShutdown, Metrics, RocksDBShutdown, ScoreboardRuntime, ServiceConfig,
    ShutdownCoordinator, StateStoreBackend, Stores,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "scoreboard-service")]
#[command(about = "Counts kills per room and publishes scores to <room>-score-topic")]
struct Args {
    /// State directory for storage
    #[arg(short = 'd', long = "state-dir")]
    state_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short = 'c', long = "config", default_value = "client.dev.properties")]
    config: PathBuf,

    /// Stream config file path
    #[arg(long = "stream-config")]
    stream_config: Option<PathBuf>,

    /// Keep counters in memory instead of RocksDB
    #[arg(long = "in-memory")]
    in_memory: bool,

    /// Serve /metrics and /health on this port
    #[arg(long = "metrics-port")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting Scoreboard Service");
    info!("Config file: {:?}", args.config);

    let config = load_config(&args)?;
    info!("State directory: {}", config.state_dir);

    let metrics = Metrics::new()?;
    let store = if args.in_memory {
        info!("Using in-memory counter store");
        StateStoreBackend::new_in_memory()
    } else {
        StateStoreBackend::new_rocksdb(Path::new(&config.state_dir).join(Stores::SCORE))?
    };

    let runtime = ScoreboardRuntime::new(&config, Arc::new(store.clone()), metrics.clone())?;

    let coordinator = ShutdownCoordinator::default();
    coordinator
        .register_component(Box::new(KafkaProducerShutdown::new(runtime.producer())))
        .await;
    if let Some(rocksdb) = store.rocksdb() {
        coordinator
            .register_component(Box::new(RocksDBShutdown::new(rocksdb)))
            .await;
    }

    if let Some(port) = args.metrics_port {
        let router = scoreboard::metrics_router(Arc::new(metrics));
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Metrics listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let stop = coordinator.subscribe();
    let signals = coordinator.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => signals.trigger(),
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    });

    // Flush the producer and the store even when the loop failed
    let result = runtime.run(stop).await;
    if let Err(e) = &result {
        error!("Scoreboard stopped with error: {}", e);
    }
    coordinator.shutdown().await?;

    Ok(result?)
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = parse_properties_file(&args.config, "scoreboard")?;

    if let Some(stream_config_path) = &args.stream_config {
        info!("Loading stream config from: {:?}", stream_config_path);
        config = merge_stream_properties(config, stream_config_path)?;
    }

    let mut config = apply_env_overrides(config)?;
    if let Some(state_dir) = &args.state_dir {
        config.state_dir = state_dir.to_string_lossy().to_string();
    }

    Ok(config)
}
