use async_trait::async_trait;

use crate::error::DomainResult;
use crate::types::{Cursor, Device, ScanPage};

/// Keyed device inventory, addressed by device ID.
/// Infrastructure layer (e.g., inventory-postgres) implements this trait.
///
/// Every operation may fail with `DomainError::StoreUnavailable`; callers abort the
/// current unit of work instead of retrying.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Upsert a device record. Storing the same ID twice leaves one record.
    async fn put_device(&self, device_id: &str) -> DomainResult<()>;

    /// Remove a device record. Deleting an absent ID is not an error.
    async fn delete_device(&self, device_id: &str) -> DomainResult<()>;

    /// Fetch one page of records, starting after `cursor` (or from the beginning).
    /// A `None` next cursor on the returned page means the scan is exhausted.
    async fn scan_devices(&self, cursor: Option<Cursor>) -> DomainResult<ScanPage>;
}

/// Per-device action driven by a reconciliation pass
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceConfigurator: Send + Sync {
    async fn configure(&self, device: &Device) -> anyhow::Result<()>;
}
