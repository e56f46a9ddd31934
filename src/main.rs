//! ExhibitStream - museum floor interaction pipeline
//!
//! Consumes kiosk events from Kafka, validates them against the exhibition
//! floor rules, normalizes accepted events and stores them in PostgreSQL.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;

use exhibitstream::api::health::{health_monitor, KAFKA_COMPONENT};
use exhibitstream::api::{create_server, shutdown_signal, AppState, HealthState, HealthStatus};
use exhibitstream::db::{create_pool, run_migrations, PgInteractionRepository, RetryConfig};
use exhibitstream::kafka::{EventConsumer, MessageProcessor};
use exhibitstream::logging::{init_tracing, DEFAULT_LOG_FILE};
use exhibitstream::{Config, Error, EventValidator, PipelineStats, Result, TracingDiagnostics};

/// Validates museum floor interaction events and stores them
#[derive(Parser, Debug)]
#[command(name = "exhibitstream", version, about)]
struct Cli {
    /// Write logs to a file instead of the terminal
    #[arg(short, long)]
    log: bool,

    /// File used with --log
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env()?;
    let rules = config.validate()?;

    init_tracing(
        &config.server.log_level,
        &config.server.environment,
        cli.log.then_some(cli.log_file.as_path()),
    )?;

    config.log_config();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ExhibitStream");

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool)
        .await
        .map_err(|e| Error::database(format!("Migration failed: {}", e)))?;

    let repo = Arc::new(PgInteractionRepository::with_retry_config(
        pool,
        RetryConfig::from_database_config(&config.database),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let health = HealthState::new();
    let stats = Arc::new(PipelineStats::new());

    let processor = MessageProcessor::new(
        EventValidator::new(rules),
        repo.clone(),
        Arc::new(TracingDiagnostics),
        stats.clone(),
    );

    let consumer = EventConsumer::new(config.kafka.clone(), processor)?;
    health
        .update_component(KAFKA_COMPONENT, HealthStatus::Healthy, Some("Subscribed".to_string()))
        .await;

    let consumer_health = health.clone();
    let consumer_shutdown = shutdown_rx.clone();
    let consumer_task = tokio::spawn(async move {
        if let Err(e) = consumer.run(consumer_shutdown).await {
            tracing::error!(error = %e, "Kafka consumer error");
            consumer_health
                .update_component(KAFKA_COMPONENT, HealthStatus::Unhealthy, Some(e.to_string()))
                .await;
        }
    });

    let monitor_task = tokio::spawn(health_monitor(health.clone(), repo, shutdown_rx.clone()));

    let state = AppState { health, stats };
    let server_config = config.server.clone();
    let server_shutdown = shutdown_rx.clone();
    let server_task =
        tokio::spawn(async move { create_server(&server_config, state, server_shutdown).await });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "Kafka consumer task failed");
    }
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }
    match server_task.await {
        Ok(result) => result?,
        Err(e) => return Err(Error::internal(format!("HTTP server task failed: {}", e))),
    }

    tracing::info!("ExhibitStream shutdown complete");
    Ok(())
}
