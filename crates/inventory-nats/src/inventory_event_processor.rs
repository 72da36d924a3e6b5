use inventory_domain::{EventSynchronizer, InboundMessage, MessageOutcome, SyncReport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::consumer::{BatchProcessor, ProcessingResult};

/// What to do with a message whose store mutation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationFailurePolicy {
    /// Nak so JetStream redelivers; safe because mutations are idempotent
    Redeliver,
    /// Ack and rely on the error log only
    Drop,
}

impl MutationFailurePolicy {
    pub fn from_nak_flag(nak_on_mutation_failure: bool) -> Self {
        if nak_on_mutation_failure {
            Self::Redeliver
        } else {
            Self::Drop
        }
    }
}

/// Map per-message sync outcomes onto JetStream acknowledgements.
///
/// Decode failures and unrecognized events are acked: redelivering them cannot help.
/// Cancelled messages are always naked since they were never processed.
pub fn processing_result_from_report(
    report: &SyncReport,
    policy: MutationFailurePolicy,
) -> ProcessingResult {
    let mut ack = Vec::new();
    let mut nak = Vec::new();

    for (idx, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            MessageOutcome::Applied { .. }
            | MessageOutcome::Ignored { .. }
            | MessageOutcome::Skipped(_) => ack.push(idx),
            MessageOutcome::Failed { error, .. } => match policy {
                MutationFailurePolicy::Redeliver => nak.push((idx, Some(error.to_string()))),
                MutationFailurePolicy::Drop => ack.push(idx),
            },
            MessageOutcome::Cancelled => nak.push((idx, Some("cancelled".to_string()))),
        }
    }

    ProcessingResult::new(ack, nak)
}

/// Creates the batch processor that feeds inventory events to the synchronizer
pub fn create_inventory_event_processor(
    synchronizer: Arc<EventSynchronizer>,
    policy: MutationFailurePolicy,
    ctx: CancellationToken,
) -> BatchProcessor {
    Box::new(move |messages: Vec<InboundMessage>| {
        let synchronizer = Arc::clone(&synchronizer);
        let ctx = ctx.clone();
        Box::pin(async move {
            let report = synchronizer.sync_batch(&messages, &ctx).await;
            Ok(processing_result_from_report(&report, policy))
        })
    })
}
