mod config;
mod reconciliation_schedule;
mod runner;
mod telemetry;

use anyhow::{anyhow, bail, Context};
use config::ServiceConfig;
use inventory_domain::{
    EventSynchronizer, InMemoryInventoryStore, InventoryStore, LoggingDeviceConfigurator,
    ReconciliationMode, ReconciliationScanner,
};
use inventory_nats::{
    create_inventory_event_processor, MutationFailurePolicy, NatsClient, NatsConsumer,
};
use inventory_postgres::{PostgresClient, PostgresInventoryStore};
use reconciliation_schedule::ReconciliationSchedule;
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&TelemetryConfig::from(&config)) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        table = %config.table,
        store_backend = %config.store_backend,
        otel_enabled = config.otel_enabled,
        "Starting inventory-sync service"
    );
    debug!("Configuration: {:?}", config);

    let shutdown_token = CancellationToken::new();

    let (consumer, schedule, nats_client) = match build_processes(&config, &shutdown_token).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to initialize service: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let result = Runner::new()
        .with_cancellation_token(shutdown_token)
        .with_named_process("event_synchronizer", move |ctx| consumer.run(ctx))
        .with_named_process("reconciliation_schedule", move |ctx| schedule.run(ctx))
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            nats_client.close().await;
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    match result {
        Ok(()) => {
            info!("Application exiting normally");
            std::process::exit(0);
        }
        Err(e) => {
            error!("Application exiting with error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn build_processes(
    config: &ServiceConfig,
    shutdown_token: &CancellationToken,
) -> anyhow::Result<(NatsConsumer, ReconciliationSchedule, NatsClient)> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    let reconcile_mode: ReconciliationMode = config
        .reconcile_mode
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    let store = build_inventory_store(config)?;

    let nats_client = NatsClient::connect(&config.nats_url, startup_timeout).await?;
    if config.nats_ensure_stream {
        nats_client
            .ensure_stream(&config.nats_stream, &config.nats_subject)
            .await?;
    }

    let synchronizer = Arc::new(EventSynchronizer::new(Arc::clone(&store)));
    let processor = create_inventory_event_processor(
        synchronizer,
        MutationFailurePolicy::from_nak_flag(config.nak_on_mutation_failure),
        shutdown_token.clone(),
    );

    let consumer = tokio::time::timeout(
        startup_timeout,
        NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.nats_stream,
            &config.nats_consumer_name,
            &config.nats_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            processor,
        ),
    )
    .await
    .context("Timed out creating inventory consumer")??;

    let scanner = Arc::new(
        ReconciliationScanner::new(store, Arc::new(LoggingDeviceConfigurator))
            .with_mode(reconcile_mode),
    );
    let schedule = ReconciliationSchedule::new(
        scanner,
        Duration::from_secs(config.reconcile_interval_secs.max(1)),
    );

    Ok((consumer, schedule, nats_client))
}

fn build_inventory_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn InventoryStore>> {
    match config.store_backend.as_str() {
        "postgres" => {
            let client = PostgresClient::new(&config.postgres_config())?;
            info!(table = %config.table, "Using PostgreSQL inventory store");
            Ok(Arc::new(PostgresInventoryStore::new(
                client,
                config.table.clone(),
                config.scan_page_size,
            )))
        }
        "memory" => {
            info!("Using in-memory inventory store");
            Ok(Arc::new(InMemoryInventoryStore::with_page_size(
                config.scan_page_size,
            )))
        }
        other => bail!("unknown store backend: {}", other),
    }
}
