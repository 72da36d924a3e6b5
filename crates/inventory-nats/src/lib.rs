mod client;
mod consumer;
mod inventory_event_processor;
mod traits;

pub use client::{NatsClient, NatsJetStreamConsumer, NatsPullConsumer};
pub use consumer::{BatchProcessor, NatsConsumer, ProcessingResult};
pub use inventory_event_processor::{
    create_inventory_event_processor, processing_result_from_report, MutationFailurePolicy,
};
pub use traits::{FetchedMessage, JetStreamConsumer, MessageAcker, PullConsumer};

#[cfg(any(test, feature = "testing"))]
pub use traits::{MockJetStreamConsumer, MockMessageAcker, MockPullConsumer};
