use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;
use inventory_domain::InboundMessage;

/// Trait for JetStream consumer operations
/// Abstracts creating a durable pull consumer on a stream
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations
/// Returns a batch of messages up to max_messages, waiting up to expires
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<FetchedMessage>>;
}

/// Acknowledgement handle for one fetched message
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageAcker: Send + Sync {
    async fn ack(&self) -> Result<()>;

    /// Negative acknowledgement; the server redelivers the message
    async fn nak(&self) -> Result<()>;
}

/// A message pulled from JetStream, already converted to the domain shape
pub struct FetchedMessage {
    pub message: InboundMessage,
    pub acker: Box<dyn MessageAcker>,
}

impl FetchedMessage {
    pub fn new(message: InboundMessage, acker: Box<dyn MessageAcker>) -> Self {
        Self { message, acker }
    }
}
