use async_trait::async_trait;
use tracing::debug;

use inventory_domain::{Cursor, Device, DomainError, DomainResult, InventoryStore, ScanPage};

use crate::client::PostgresClient;

/// Quote a table name for interpolation into SQL, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct InventoryQueries {
    put: String,
    delete: String,
    scan: String,
}

impl InventoryQueries {
    fn for_table(table: &str) -> Self {
        let table = quote_identifier(table);
        Self {
            put: format!(
                "INSERT INTO {} (device_id) VALUES ($1) ON CONFLICT (device_id) DO NOTHING",
                table
            ),
            delete: format!("DELETE FROM {} WHERE device_id = $1", table),
            scan: format!(
                "SELECT device_id FROM {} \
                 WHERE $1::text IS NULL OR device_id > $1 \
                 ORDER BY device_id \
                 LIMIT $2",
                table
            ),
        }
    }
}

/// PostgreSQL implementation of InventoryStore.
///
/// Expects a table with a `device_id text PRIMARY KEY` column. Scans use keyset
/// pagination on `device_id`; the cursor is the last key of the previous page.
/// The table name is not checked up front, so a missing table surfaces as
/// `StoreUnavailable` on first use.
pub struct PostgresInventoryStore {
    client: PostgresClient,
    table: String,
    page_size: usize,
    queries: InventoryQueries,
}

impl PostgresInventoryStore {
    pub fn new(client: PostgresClient, table: impl Into<String>, page_size: usize) -> Self {
        let table = table.into();
        let queries = InventoryQueries::for_table(&table);
        Self {
            client,
            table,
            page_size: page_size.max(1),
            queries,
        }
    }
}

fn store_error(e: tokio_postgres::Error) -> DomainError {
    DomainError::StoreUnavailable(e.into())
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn put_device(&self, device_id: &str) -> DomainResult<()> {
        let conn = self.client.get_connection().await?;

        let inserted = conn
            .execute(self.queries.put.as_str(), &[&device_id])
            .await
            .map_err(store_error)?;

        debug!(device_id = %device_id, table = %self.table, inserted, "stored device");
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> DomainResult<()> {
        let conn = self.client.get_connection().await?;

        let deleted = conn
            .execute(self.queries.delete.as_str(), &[&device_id])
            .await
            .map_err(store_error)?;

        debug!(device_id = %device_id, table = %self.table, deleted, "deleted device");
        Ok(())
    }

    async fn scan_devices(&self, cursor: Option<Cursor>) -> DomainResult<ScanPage> {
        let conn = self.client.get_connection().await?;

        let start_after: Option<&str> = cursor
            .as_ref()
            .map(Cursor::as_str)
            .filter(|c| !c.is_empty());
        // One extra row tells us whether another page follows
        let limit = (self.page_size + 1) as i64;

        let rows = conn
            .query(self.queries.scan.as_str(), &[&start_after, &limit])
            .await
            .map_err(store_error)?;

        let has_more = rows.len() > self.page_size;
        let devices: Vec<Device> = rows
            .iter()
            .take(self.page_size)
            .map(|row| Device::new(row.get::<_, String>(0)))
            .collect();

        let next_cursor = if has_more {
            devices.last().map(|d| Cursor::new(d.device_id.clone()))
        } else {
            None
        };

        debug!(
            table = %self.table,
            devices = devices.len(),
            has_more,
            "scanned device page"
        );

        Ok(ScanPage::new(devices, next_cursor))
    }
}
