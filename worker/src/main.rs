//! Score-ingestion worker.
//!
//! Consumes score events from the broker and applies each one to the
//! Postgres score history and the Redis leaderboard. Runs until SIGINT or
//! SIGTERM; backend outages are retried, never fatal.

mod config;

use anyhow::Context;
use config::WorkerConfig;
use scoreboard_core::ack::AckPolicy;
use scoreboard_postgres::{PostgresConnector, PostgresDeadLetterQueue};
use scoreboard_redis::RedisConnector;
use scoreboard_redpanda::KafkaConnector;
use scoreboard_runtime::metrics::register_metrics;
use scoreboard_runtime::retry::RetryPolicy;
use scoreboard_runtime::{ConnectionSupervisor, ScoreWorker};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,score_worker=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_metrics();

    let config = WorkerConfig::from_env();
    info!(
        brokers = %config.queue.brokers,
        topic = %config.queue.topic,
        consumer_group = %config.queue.consumer_group,
        redis_url = %config.redis.url,
        leaderboard_key = %config.redis.leaderboard_key,
        reconnect_interval_secs = config.reconnect_interval_secs,
        max_decode_attempts = config.max_decode_attempts,
        "Configuration loaded"
    );

    let queue = KafkaConnector::builder()
        .brokers(&config.queue.brokers)
        .topic(&config.queue.topic)
        .consumer_group(&config.queue.consumer_group)
        .auto_offset_reset(&config.queue.auto_offset_reset)
        .build()
        .context("Invalid queue configuration")?;
    let records = PostgresConnector::new(&config.database.url, config.database.max_connections);
    let ranking = RedisConnector::new(&config.redis.url, &config.redis.leaderboard_key);

    let supervisor = Arc::new(ConnectionSupervisor::new(
        queue,
        records,
        ranking,
        &RetryPolicy::fixed(config.reconnect_interval()),
    ));

    let dead_letters = PostgresDeadLetterQueue::connect_lazy(&config.database.url)
        .context("Invalid DATABASE_URL")?;

    // Connect everything up front so outages show in the logs before the
    // first message arrives.
    let warmup = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            if let Err(e) = supervisor.connect_all().await {
                warn!(error = %e, "Eager connect gave up");
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = ScoreWorker::new(
        supervisor,
        AckPolicy::new(config.max_decode_attempts),
        dead_letters,
    );
    let worker = worker.spawn(shutdown_rx);

    shutdown_signal().await;
    warmup.abort();
    // No receivers left means the worker already stopped.
    let _ = shutdown_tx.send(());
    worker.await.context("Worker task panicked")?;

    info!("Score worker exited cleanly");
    Ok(())
}

/// Waits for Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down");
        },
    }
}
