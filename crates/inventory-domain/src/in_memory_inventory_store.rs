use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{DomainError, DomainResult};
use crate::repository::InventoryStore;
use crate::types::{Cursor, Device, ScanPage};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory implementation of InventoryStore using an ordered map.
/// Pages are returned in key order; the cursor is the last key of the previous page.
#[derive(Clone)]
pub struct InMemoryInventoryStore {
    devices: Arc<RwLock<BTreeMap<String, Device>>>,
    page_size: usize,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            devices: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: page_size.max(1),
        }
    }

    pub async fn contains(&self, device_id: &str) -> bool {
        self.devices.read().await.contains_key(device_id)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn put_device(&self, device_id: &str) -> DomainResult<()> {
        if device_id.is_empty() {
            return Err(DomainError::InvalidDeviceId(
                "Device ID cannot be empty".to_string(),
            ));
        }

        let mut devices = self.devices.write().await;
        devices.insert(device_id.to_string(), Device::new(device_id));
        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> DomainResult<()> {
        let mut devices = self.devices.write().await;
        devices.remove(device_id);
        Ok(())
    }

    async fn scan_devices(&self, cursor: Option<Cursor>) -> DomainResult<ScanPage> {
        let devices = self.devices.read().await;

        let lower = match cursor.as_ref().filter(|c| !c.is_empty()) {
            Some(c) => Bound::Excluded(c.as_str().to_string()),
            None => Bound::Unbounded,
        };

        let mut remaining = devices.range((lower, Bound::Unbounded));
        let page: Vec<Device> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(_, device)| device.clone())
            .collect();

        let next_cursor = match (remaining.next(), page.last()) {
            (Some(_), Some(last)) => Some(Cursor::new(last.device_id.clone())),
            _ => None,
        };

        Ok(ScanPage::new(page, next_cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = InMemoryInventoryStore::new();

        store.put_device("dev-1").await.unwrap();
        store.put_device("dev-1").await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.contains("dev-1").await);
    }

    #[tokio::test]
    async fn test_delete_absent_device_is_not_an_error() {
        let store = InMemoryInventoryStore::new();

        let result = store.delete_device("missing").await;

        assert!(result.is_ok());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_rejects_empty_id() {
        let store = InMemoryInventoryStore::new();

        let result = store.put_device("").await;

        assert!(matches!(result, Err(DomainError::InvalidDeviceId(_))));
    }

    #[tokio::test]
    async fn test_scan_pages_by_exclusive_start_key() {
        let store = InMemoryInventoryStore::with_page_size(2);
        for id in ["a", "b", "c"] {
            store.put_device(id).await.unwrap();
        }

        let first = store.scan_devices(None).await.unwrap();
        assert_eq!(first.devices, vec![Device::new("a"), Device::new("b")]);
        assert_eq!(first.next_cursor, Some(Cursor::new("b")));

        let second = store.scan_devices(first.next_cursor).await.unwrap();
        assert_eq!(second.devices, vec![Device::new("c")]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_scan_exact_page_boundary_ends_without_cursor() {
        let store = InMemoryInventoryStore::with_page_size(2);
        store.put_device("a").await.unwrap();
        store.put_device("b").await.unwrap();

        let page = store.scan_devices(None).await.unwrap();

        assert_eq!(page.devices.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_scan_empty_store() {
        let store = InMemoryInventoryStore::new();

        let page = store.scan_devices(None).await.unwrap();

        assert!(page.devices.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
