use event_bus::{EventBus, InMemoryBus, NatsPublisher};
use outbox::{OutboxProcessor, PgStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use orders_rs::{
    config::{BusType, Config},
    db::{init_pool, run_migrations},
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting orders service...");

    let config = Config::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        bus_type = %config.bus_type,
        exchange = %config.broker.exchange,
        routing_key = %config.broker.routing_key,
        "Configuration loaded"
    );

    tracing::info!("Connecting to database...");
    let pool = init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running migrations...");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let bus: Arc<dyn EventBus> = match config.bus_type {
        BusType::InMemory => {
            tracing::info!("Using InMemory event bus");
            Arc::new(InMemoryBus::with_config(&config.broker))
        }
        BusType::Nats => {
            // Connects lazily on the first publish
            tracing::info!(server = %config.broker.server_url(), "Using NATS JetStream event bus");
            Arc::new(NatsPublisher::nats(config.broker.clone()))
        }
    };

    let store = Arc::new(PgStore::new(pool));
    let processor = OutboxProcessor::new(store, bus, config.outbox.clone());

    let shutdown = CancellationToken::new();
    let processor_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { processor.run(shutdown).await }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }

    shutdown.cancel();
    if let Err(e) = processor_task.await {
        tracing::error!(error = %e, "Outbox processor task panicked");
    }

    tracing::info!("Orders service stopped");
}
