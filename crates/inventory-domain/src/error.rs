use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] anyhow::Error),

    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    #[error("Scan failed on page {page}: {source}")]
    ScanFailed {
        page: usize,
        #[source]
        source: Box<DomainError>,
    },

    #[error("Scan cursor repeated on page {page}: {cursor}")]
    CursorCycle { page: usize, cursor: String },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Why a single inbound message could not be turned into an inventory event
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid notification envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Invalid inventory event: {0}")]
    InvalidEvent(#[source] serde_json::Error),

    #[error("Missing device ID for {event_type} event")]
    MissingDeviceId { event_type: String },
}
