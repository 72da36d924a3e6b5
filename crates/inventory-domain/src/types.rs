use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Domain representation of a managed device known to the inventory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

impl Device {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

/// Opaque continuation token returned by a paginated scan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty tokens mark the end of a traversal, same as no token at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a full-table scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub devices: Vec<Device>,
    pub next_cursor: Option<Cursor>,
}

impl ScanPage {
    pub fn new(devices: Vec<Device>, next_cursor: Option<Cursor>) -> Self {
        Self {
            devices,
            next_cursor,
        }
    }

    /// Returns the cursor to continue with, treating an empty token as exhausted
    pub fn continuation(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref().filter(|c| !c.is_empty())
    }
}

/// A transport-level message handed to the event synchronizer
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Transport identity used for diagnostics (e.g. subject and sequence)
    pub label: String,
    pub body: Bytes,
}

impl InboundMessage {
    pub fn new(label: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
        }
    }
}
