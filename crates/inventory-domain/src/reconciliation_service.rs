use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::collections::HashSet;
use std::pin::pin;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DomainError, DomainResult};
use crate::repository::{DeviceConfigurator, InventoryStore};
use crate::types::{Cursor, Device};

/// How a reconciliation pass drives the per-device action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconciliationMode {
    /// Traverse the whole store first, then configure. A failed page means no device
    /// is configured in that run.
    #[default]
    Collect,
    /// Configure each page as it arrives, holding a single page in memory
    Streaming,
}

impl FromStr for ReconciliationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collect" => Ok(Self::Collect),
            "streaming" => Ok(Self::Streaming),
            other => Err(format!("unknown reconciliation mode: {}", other)),
        }
    }
}

/// Counters for one completed reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub pages: usize,
    pub devices_visited: usize,
    pub configure_failures: usize,
}

struct ScanState {
    store: Arc<dyn InventoryStore>,
    ctx: CancellationToken,
    cursor: Option<Cursor>,
    seen: HashSet<Cursor>,
    page: usize,
    exhausted: bool,
}

/// Walk the store's cursor chain, yielding one page of devices at a time.
///
/// The stream ends after the page that carries no continuation cursor. A failed page,
/// a cursor the store already handed out, or cancellation ends it with an error.
pub fn scan_pages(
    store: Arc<dyn InventoryStore>,
    ctx: CancellationToken,
) -> impl Stream<Item = DomainResult<Vec<Device>>> + Send {
    let state = ScanState {
        store,
        ctx,
        cursor: None,
        seen: HashSet::new(),
        page: 0,
        exhausted: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        if state.exhausted {
            return Ok(None);
        }
        if state.ctx.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        state.page += 1;
        let page_number = state.page;
        let cursor = state.cursor.take();

        let page = tokio::select! {
            biased;
            _ = state.ctx.cancelled() => return Err(DomainError::Cancelled),
            result = state.store.scan_devices(cursor) => {
                result.map_err(|e| DomainError::ScanFailed {
                    page: page_number,
                    source: Box::new(e),
                })?
            }
        };

        match page.continuation() {
            Some(next) => {
                if !state.seen.insert(next.clone()) {
                    return Err(DomainError::CursorCycle {
                        page: page_number,
                        cursor: next.to_string(),
                    });
                }
                state.cursor = Some(next.clone());
            }
            None => state.exhausted = true,
        }

        debug!(
            page = page_number,
            devices = page.devices.len(),
            more = !state.exhausted,
            "Scanned inventory page"
        );

        Ok(Some((page.devices, state)))
    })
}

/// Full-table pass that hands every known device to a configurator
pub struct ReconciliationScanner {
    store: Arc<dyn InventoryStore>,
    configurator: Arc<dyn DeviceConfigurator>,
    mode: ReconciliationMode,
}

impl ReconciliationScanner {
    pub fn new(store: Arc<dyn InventoryStore>, configurator: Arc<dyn DeviceConfigurator>) -> Self {
        Self {
            store,
            configurator,
            mode: ReconciliationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ReconciliationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ReconciliationMode {
        self.mode
    }

    /// Traverse every page and return the complete device set
    pub async fn collect_devices(&self, ctx: &CancellationToken) -> DomainResult<Vec<Device>> {
        let (devices, _) = self.collect_with_page_count(ctx).await?;
        Ok(devices)
    }

    /// Run one reconciliation pass. Fails only if the traversal fails;
    /// configurator errors are counted in the summary.
    #[instrument(skip_all, fields(mode = ?self.mode))]
    pub async fn run(&self, ctx: &CancellationToken) -> DomainResult<ReconciliationSummary> {
        let result = match self.mode {
            ReconciliationMode::Collect => self.run_collect(ctx).await,
            ReconciliationMode::Streaming => self.run_streaming(ctx).await,
        };

        match &result {
            Ok(summary) => info!(
                pages = summary.pages,
                devices = summary.devices_visited,
                configure_failures = summary.configure_failures,
                "Reconciliation complete"
            ),
            Err(e) => error!(error = %e, "Reconciliation failed"),
        }

        result
    }

    async fn run_collect(&self, ctx: &CancellationToken) -> DomainResult<ReconciliationSummary> {
        let (devices, pages) = self.collect_with_page_count(ctx).await?;

        let mut summary = ReconciliationSummary {
            pages,
            ..Default::default()
        };

        for device in &devices {
            if ctx.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            self.configure(device, &mut summary).await;
        }

        Ok(summary)
    }

    async fn run_streaming(&self, ctx: &CancellationToken) -> DomainResult<ReconciliationSummary> {
        let mut pages = pin!(scan_pages(Arc::clone(&self.store), ctx.clone()));
        let mut summary = ReconciliationSummary::default();

        while let Some(devices) = pages.try_next().await? {
            summary.pages += 1;
            for device in &devices {
                if ctx.is_cancelled() {
                    return Err(DomainError::Cancelled);
                }
                self.configure(device, &mut summary).await;
            }
        }

        Ok(summary)
    }

    async fn collect_with_page_count(
        &self,
        ctx: &CancellationToken,
    ) -> DomainResult<(Vec<Device>, usize)> {
        let mut pages = pin!(scan_pages(Arc::clone(&self.store), ctx.clone()));
        let mut devices = Vec::new();
        let mut page_count = 0;

        while let Some(page) = pages.try_next().await? {
            page_count += 1;
            devices.extend(page);
        }

        debug!(pages = page_count, devices = devices.len(), "Collected inventory");
        Ok((devices, page_count))
    }

    async fn configure(&self, device: &Device, summary: &mut ReconciliationSummary) {
        summary.devices_visited += 1;
        if let Err(e) = self.configurator.configure(device).await {
            summary.configure_failures += 1;
            warn!(
                device_id = %device.device_id,
                error = %e,
                "Failed to configure device"
            );
        }
    }
}

/// Default configuration action: records the pass in the log and nothing else
#[derive(Debug, Clone, Default)]
pub struct LoggingDeviceConfigurator;

#[async_trait]
impl DeviceConfigurator for LoggingDeviceConfigurator {
    async fn configure(&self, device: &Device) -> anyhow::Result<()> {
        info!(device_id = %device.device_id, "Configuring device");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_inventory_store::InMemoryInventoryStore;
    use crate::repository::{MockDeviceConfigurator, MockInventoryStore};
    use crate::types::ScanPage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConfigurator {
        configured: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    impl RecordingConfigurator {
        fn configured(&self) -> Vec<String> {
            self.configured.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceConfigurator for RecordingConfigurator {
        async fn configure(&self, device: &Device) -> anyhow::Result<()> {
            self.configured.lock().unwrap().push(device.device_id.clone());
            if self.fail_for.as_deref() == Some(device.device_id.as_str()) {
                anyhow::bail!("device {} unreachable", device.device_id);
            }
            Ok(())
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> ScanPage {
        ScanPage::new(
            ids.iter().map(|id| Device::new(*id)).collect(),
            next.map(Cursor::new),
        )
    }

    fn store_unavailable() -> DomainError {
        DomainError::StoreUnavailable(anyhow::anyhow!("throughput exceeded"))
    }

    #[tokio::test]
    async fn test_collect_visits_every_record_for_any_page_size() {
        let expected: Vec<Device> = (0..13).map(|i| Device::new(format!("dev-{:02}", i))).collect();

        for page_size in 1..=15 {
            let store = InMemoryInventoryStore::with_page_size(page_size);
            for device in &expected {
                store.put_device(&device.device_id).await.unwrap();
            }

            let scanner = ReconciliationScanner::new(
                Arc::new(store),
                Arc::new(LoggingDeviceConfigurator),
            );
            let devices = scanner.collect_devices(&CancellationToken::new()).await.unwrap();

            assert_eq!(devices, expected, "page size {}", page_size);
        }
    }

    #[tokio::test]
    async fn test_cursor_is_fed_back_unchanged() {
        let mut mock_store = MockInventoryStore::new();

        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.is_none())
            .times(1)
            .returning(|_| Ok(page(&["a"], Some("X"))));
        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.as_ref().map(Cursor::as_str) == Some("X"))
            .times(1)
            .returning(|_| Ok(page(&["b"], None)));

        let configurator = Arc::new(RecordingConfigurator::default());
        let scanner = ReconciliationScanner::new(Arc::new(mock_store), configurator.clone());

        let summary = scanner.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.devices_visited, 2);
        assert_eq!(configurator.configured(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_repeating_cursor_terminates_with_error() {
        let mut mock_store = MockInventoryStore::new();

        mock_store
            .expect_scan_devices()
            .times(2)
            .returning(|_| Ok(page(&["a"], Some("X"))));

        let scanner = ReconciliationScanner::new(
            Arc::new(mock_store),
            Arc::new(LoggingDeviceConfigurator),
        );

        let result = scanner.collect_devices(&CancellationToken::new()).await;

        match result {
            Err(DomainError::CursorCycle { page, cursor }) => {
                assert_eq!(page, 2);
                assert_eq!(cursor, "X");
            }
            other => panic!("Expected CursorCycle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_cursor_ends_traversal() {
        let mut mock_store = MockInventoryStore::new();

        mock_store
            .expect_scan_devices()
            .times(1)
            .returning(|_| Ok(page(&["a", "b"], Some(""))));

        let scanner = ReconciliationScanner::new(
            Arc::new(mock_store),
            Arc::new(LoggingDeviceConfigurator),
        );

        let devices = scanner.collect_devices(&CancellationToken::new()).await.unwrap();
        assert_eq!(devices.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_before_any_configuration() {
        let mut mock_store = MockInventoryStore::new();

        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.is_none())
            .times(1)
            .returning(|_| Ok(page(&["a"], Some("p2"))));
        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.as_ref().map(Cursor::as_str) == Some("p2"))
            .times(1)
            .returning(|_| Err(store_unavailable()));

        let mut mock_configurator = MockDeviceConfigurator::new();
        mock_configurator.expect_configure().never();

        let scanner =
            ReconciliationScanner::new(Arc::new(mock_store), Arc::new(mock_configurator));

        let result = scanner.run(&CancellationToken::new()).await;

        match result {
            Err(DomainError::ScanFailed { page, source }) => {
                assert_eq!(page, 2);
                assert!(matches!(*source, DomainError::StoreUnavailable(_)));
            }
            other => panic!("Expected ScanFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_configure_failures_do_not_fail_the_run() {
        let store = InMemoryInventoryStore::with_page_size(2);
        for id in ["a", "b", "c"] {
            store.put_device(id).await.unwrap();
        }

        let configurator = Arc::new(RecordingConfigurator {
            fail_for: Some("b".to_string()),
            ..Default::default()
        });
        let scanner = ReconciliationScanner::new(Arc::new(store), configurator.clone());

        let summary = scanner.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            summary,
            ReconciliationSummary {
                pages: 2,
                devices_visited: 3,
                configure_failures: 1,
            }
        );
        assert_eq!(configurator.configured(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_streaming_configures_pages_as_they_arrive() {
        let mut mock_store = MockInventoryStore::new();

        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.is_none())
            .times(1)
            .returning(|_| Ok(page(&["a", "b"], Some("p2"))));
        mock_store
            .expect_scan_devices()
            .withf(|cursor: &Option<Cursor>| cursor.as_ref().map(Cursor::as_str) == Some("p2"))
            .times(1)
            .returning(|_| Err(store_unavailable()));

        let configurator = Arc::new(RecordingConfigurator::default());
        let scanner = ReconciliationScanner::new(Arc::new(mock_store), configurator.clone())
            .with_mode(ReconciliationMode::Streaming);

        let result = scanner.run(&CancellationToken::new()).await;

        assert!(matches!(result, Err(DomainError::ScanFailed { page: 2, .. })));
        assert_eq!(configurator.configured(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_streaming_matches_collect_on_success() {
        let store = Arc::new(InMemoryInventoryStore::with_page_size(3));
        for i in 0..10 {
            store.put_device(&format!("dev-{}", i)).await.unwrap();
        }

        let configurator = Arc::new(RecordingConfigurator::default());
        let scanner = ReconciliationScanner::new(store, configurator.clone())
            .with_mode(ReconciliationMode::Streaming);

        let summary = scanner.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.pages, 4);
        assert_eq!(summary.devices_visited, 10);
        assert_eq!(configurator.configured().len(), 10);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_scanning() {
        let mock_store = MockInventoryStore::new();
        let scanner = ReconciliationScanner::new(
            Arc::new(mock_store),
            Arc::new(LoggingDeviceConfigurator),
        );
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result = scanner.run(&ctx).await;

        assert!(matches!(result, Err(DomainError::Cancelled)));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(
            "collect".parse::<ReconciliationMode>(),
            Ok(ReconciliationMode::Collect)
        );
        assert_eq!(
            " Streaming ".parse::<ReconciliationMode>(),
            Ok(ReconciliationMode::Streaming)
        );
        assert!("batch".parse::<ReconciliationMode>().is_err());
    }
}
