use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DecodeError, DomainError};
use crate::inventory_event::{decode_message, InventoryEvent, InventoryEventKind};
use crate::repository::InventoryStore;
use crate::types::InboundMessage;

/// Store mutation an inventory event maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Put,
    Delete,
}

/// What happened to a single inbound message
#[derive(Debug)]
pub enum MessageOutcome {
    /// The store mutation was applied
    Applied { device_id: String, mutation: Mutation },
    /// Well-formed event of a kind this service does not act on
    Ignored { event_type: String },
    /// Envelope or event could not be decoded
    Skipped(DecodeError),
    /// The store rejected the mutation
    Failed {
        device_id: String,
        mutation: Mutation,
        error: DomainError,
    },
    /// Not processed because the invocation was cancelled first
    Cancelled,
}

impl MessageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-message outcomes of one batch, in input order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<MessageOutcome>,
}

impl SyncReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn applied_count(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Applied { .. }))
    }

    pub fn ignored_count(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Ignored { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(MessageOutcome::is_failed)
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Cancelled))
    }

    /// Indices of messages whose store mutation failed
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_failed())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// True when no mutation failed and nothing was left unprocessed
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0 && self.cancelled_count() == 0
    }

    fn count(&self, predicate: impl Fn(&MessageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|&o| predicate(o)).count()
    }
}

/// Applies device lifecycle notifications to the inventory store.
/// Each message is handled independently; no single message can fail the batch.
pub struct EventSynchronizer {
    store: Arc<dyn InventoryStore>,
}

impl EventSynchronizer {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Process a batch sequentially and report one outcome per message.
    /// Once `ctx` is cancelled the remaining messages are left untouched.
    #[instrument(skip_all, fields(batch_size = messages.len()))]
    pub async fn sync_batch(
        &self,
        messages: &[InboundMessage],
        ctx: &CancellationToken,
    ) -> SyncReport {
        let mut outcomes = Vec::with_capacity(messages.len());

        for message in messages {
            if ctx.is_cancelled() {
                outcomes.push(MessageOutcome::Cancelled);
                continue;
            }
            outcomes.push(self.sync_message(message).await);
        }

        let report = SyncReport { outcomes };

        info!(
            applied = report.applied_count(),
            ignored = report.ignored_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled_count(),
            "Synchronized inventory batch"
        );

        report
    }

    /// Decode and apply a single message
    pub async fn sync_message(&self, message: &InboundMessage) -> MessageOutcome {
        let (envelope, event) = match decode_message(&message.body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    message_label = %message.label,
                    body = %String::from_utf8_lossy(&message.body),
                    error = %e,
                    "Failed to decode inventory message (skipping)"
                );
                return MessageOutcome::Skipped(e);
            }
        };

        debug!(
            message_label = %message.label,
            notification_id = ?envelope.message_id,
            event_type = %event.kind,
            device_id = %event.device_id,
            "Inventory event received"
        );

        self.apply(event).await
    }

    /// Apply an already decoded event to the store
    pub async fn apply(&self, event: InventoryEvent) -> MessageOutcome {
        let device_id = event.device_id;

        let (mutation, result) = match event.kind {
            InventoryEventKind::DeviceCreated => {
                debug!(device_id = %device_id, name = ?event.name, "Storing device");
                (Mutation::Put, self.store.put_device(&device_id).await)
            }
            InventoryEventKind::DeviceDeleted => {
                debug!(device_id = %device_id, "Deleting device");
                (Mutation::Delete, self.store.delete_device(&device_id).await)
            }
            InventoryEventKind::Unknown(event_type) => {
                debug!(
                    device_id = %device_id,
                    event_type = %event_type,
                    "Ignoring unrecognized inventory event"
                );
                return MessageOutcome::Ignored { event_type };
            }
        };

        match result {
            Ok(()) => MessageOutcome::Applied {
                device_id,
                mutation,
            },
            Err(error) => {
                error!(
                    device_id = %device_id,
                    mutation = ?mutation,
                    error = %error,
                    "Failed to apply inventory mutation"
                );
                MessageOutcome::Failed {
                    device_id,
                    mutation,
                    error,
                }
            }
        }
    }
}
