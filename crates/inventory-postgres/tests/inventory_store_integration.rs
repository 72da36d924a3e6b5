use std::sync::Arc;

use inventory_domain::{
    DomainError, EventSynchronizer, InboundMessage, InventoryStore, LoggingDeviceConfigurator,
    ReconciliationScanner,
};
use inventory_postgres::{PostgresClient, PostgresConfig, PostgresInventoryStore};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio_util::sync::CancellationToken;

const TABLE: &str = "configuration";

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
    })
    .expect("Failed to create client");

    client.ping().await.unwrap();

    let conn = client.get_connection().await.unwrap();
    conn.execute(
        "CREATE TABLE configuration (device_id TEXT PRIMARY KEY)",
        &[],
    )
    .await
    .unwrap();

    (postgres, client)
}

async fn count_rows(client: &PostgresClient) -> i64 {
    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one("SELECT COUNT(*) FROM configuration", &[])
        .await
        .unwrap();
    row.get(0)
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_put_and_delete_are_idempotent() {
    let (_container, client) = setup_test_db().await;
    let store = PostgresInventoryStore::new(client.clone(), TABLE, 10);

    store.put_device("dev-1").await.unwrap();
    store.put_device("dev-1").await.unwrap();
    assert_eq!(count_rows(&client).await, 1);

    store.delete_device("dev-1").await.unwrap();
    store.delete_device("dev-1").await.unwrap();
    assert_eq!(count_rows(&client).await, 0);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_scan_visits_every_row_once() {
    let (_container, client) = setup_test_db().await;

    let seed = PostgresInventoryStore::new(client.clone(), TABLE, 10);
    for i in 0..25 {
        seed.put_device(&format!("dev-{:03}", i)).await.unwrap();
    }

    for page_size in [1, 4, 5, 25, 100] {
        let store = Arc::new(PostgresInventoryStore::new(client.clone(), TABLE, page_size));
        let scanner = ReconciliationScanner::new(store, Arc::new(LoggingDeviceConfigurator));

        let devices = scanner
            .collect_devices(&CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<String> = devices.into_iter().map(|d| d.device_id).collect();
        let expected: Vec<String> = (0..25).map(|i| format!("dev-{:03}", i)).collect();
        assert_eq!(ids, expected, "page size {}", page_size);
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_missing_table_surfaces_as_store_unavailable() {
    let (_container, client) = setup_test_db().await;
    let store = PostgresInventoryStore::new(client, "no_such_table", 10);

    let result = store.put_device("dev-1").await;

    assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_synchronizer_applies_events_to_table() {
    let (_container, client) = setup_test_db().await;
    let store = Arc::new(PostgresInventoryStore::new(client.clone(), TABLE, 10));
    let synchronizer = EventSynchronizer::new(store);

    let batch = vec![
        InboundMessage::new(
            "inventory_events.device#1",
            r#"{"message":"{\"type\":\"DeviceCreated\",\"deviceId\":\"dev-1\"}"}"#,
        ),
        InboundMessage::new(
            "inventory_events.device#2",
            r#"{"message":"{\"type\":\"DeviceCreated\",\"deviceId\":\"dev-2\"}"}"#,
        ),
        InboundMessage::new(
            "inventory_events.device#3",
            r#"{"message":"{\"type\":\"DeviceDeleted\",\"deviceId\":\"dev-1\"}"}"#,
        ),
    ];

    let report = synchronizer
        .sync_batch(&batch, &CancellationToken::new())
        .await;

    assert!(report.is_clean());
    assert_eq!(count_rows(&client).await, 1);
}
