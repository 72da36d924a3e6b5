pub mod error;
pub mod event_sync_service;
pub mod in_memory_inventory_store;
pub mod inventory_event;
pub mod reconciliation_service;
pub mod repository;
pub mod types;

pub use error::{DecodeError, DomainError, DomainResult};
pub use event_sync_service::{EventSynchronizer, MessageOutcome, Mutation, SyncReport};
pub use in_memory_inventory_store::InMemoryInventoryStore;
pub use inventory_event::{
    decode_message, InventoryEvent, InventoryEventKind, NotificationEnvelope,
};
pub use reconciliation_service::{
    scan_pages, LoggingDeviceConfigurator, ReconciliationMode, ReconciliationScanner,
    ReconciliationSummary,
};
pub use repository::{DeviceConfigurator, InventoryStore};
pub use types::{Cursor, Device, InboundMessage, ScanPage};

#[cfg(any(test, feature = "testing"))]
pub use repository::{MockDeviceConfigurator, MockInventoryStore};
