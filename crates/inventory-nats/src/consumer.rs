use anyhow::{Context, Result};
use async_nats::jetstream;
use futures::future::BoxFuture;
use inventory_domain::InboundMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::traits::{FetchedMessage, JetStreamConsumer, PullConsumer};

/// Result of processing a batch of messages
/// Provides fine-grained control over which messages to acknowledge vs reject
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Messages that were handled and should be acknowledged (Ack)
    pub ack: Vec<usize>,
    /// Messages that should be redelivered (Nak) with optional error details
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    /// Create a result where all messages should be acknowledged
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    /// Create a result where all messages should be rejected
    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    /// Create a result with specific ack/nak indices
    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Type alias for the batch processor function
/// Takes the decoded transport messages of one batch and decides ack/nak per index
pub type BatchProcessor =
    Box<dyn Fn(Vec<InboundMessage>) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// NATS JetStream consumer that hands batches of messages to a processor
/// and applies the processor's acknowledgements
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    stream_name: String,
    consumer_name: String,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        // Create or get existing durable consumer
        let config = jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            stream_name: stream_name.to_string(),
            consumer_name: consumer_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "Starting consumer loop"
        );

        loop {
            // Only the fetch races shutdown. A fetched batch is always processed and
            // settled; the processor stops between messages and naks the remainder.
            let fetched = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_batch() => result,
            };

            match fetched {
                Ok(fetched) => self.process_batch(fetched).await,
                Err(e) => {
                    error!(error = %e, "Error fetching batch");
                    tokio::select! {
                        _ = ctx.cancelled() => {
                            info!("Received shutdown signal, stopping consumer");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_batch(&self) -> Result<Vec<FetchedMessage>> {
        debug!(
            batch_size = self.batch_size,
            max_wait_secs = self.max_wait.as_secs(),
            "Fetching message batch"
        );

        self.consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await
    }

    async fn process_batch(&self, fetched: Vec<FetchedMessage>) {
        if fetched.is_empty() {
            debug!("No messages in batch");
            return;
        }

        debug!(message_count = fetched.len(), "Received message batch");

        let messages: Vec<InboundMessage> = fetched.iter().map(|f| f.message.clone()).collect();

        let processing_result = match (self.processor)(messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, rejecting all messages");
                ProcessingResult::nak_all(fetched.len(), Some(e.to_string()))
            }
        };

        apply_processing_result(&fetched, processing_result).await;
    }
}

async fn apply_processing_result(fetched: &[FetchedMessage], result: ProcessingResult) {
    let ack_count = result.ack.len();
    for idx in result.ack {
        match fetched.get(idx) {
            Some(msg) => {
                if let Err(e) = msg.acker.ack().await {
                    error!(error = %e, message_index = idx, "Failed to acknowledge message");
                }
            }
            None => warn!(
                message_index = idx,
                batch_size = fetched.len(),
                "Invalid ack index in ProcessingResult"
            ),
        }
    }

    if ack_count > 0 {
        debug!(ack_count, "Acknowledged messages");
    }

    let nak_count = result.nak.len();
    for (idx, error_msg) in result.nak {
        match fetched.get(idx) {
            Some(msg) => {
                warn!(
                    message_index = idx,
                    message_label = %msg.message.label,
                    error = error_msg.as_deref().unwrap_or("none"),
                    "Rejecting message for redelivery"
                );
                if let Err(e) = msg.acker.nak().await {
                    error!(error = %e, message_index = idx, "Failed to reject message");
                }
            }
            None => warn!(
                message_index = idx,
                batch_size = fetched.len(),
                "Invalid nak index in ProcessingResult"
            ),
        }
    }

    if nak_count > 0 {
        debug!(nak_count, "Rejected messages for redelivery");
    }
}
