use serde::Deserialize;

use crate::error::DecodeError;

/// Outer transport wrapper whose `message` field carries an encoded inventory event.
/// Accepts both the lowercase keys and the capitalized keys SNS-style envelopes use;
/// when a body carries both spellings the lowercase one wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawNotificationEnvelope")]
pub struct NotificationEnvelope {
    pub message: String,
    pub message_id: Option<String>,
    pub topic_arn: Option<String>,
}

#[derive(Deserialize)]
struct RawNotificationEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "Message")]
    sns_message: Option<String>,
    #[serde(default, rename = "messageId")]
    message_id: Option<String>,
    #[serde(default, rename = "MessageId")]
    sns_message_id: Option<String>,
    #[serde(default, rename = "topicArn")]
    topic_arn: Option<String>,
    #[serde(default, rename = "TopicArn")]
    sns_topic_arn: Option<String>,
}

impl TryFrom<RawNotificationEnvelope> for NotificationEnvelope {
    type Error = String;

    fn try_from(raw: RawNotificationEnvelope) -> Result<Self, Self::Error> {
        let message = raw
            .message
            .or(raw.sns_message)
            .ok_or_else(|| "missing field `message`".to_string())?;

        Ok(Self {
            message,
            message_id: raw.message_id.or(raw.sns_message_id),
            topic_arn: raw.topic_arn.or(raw.sns_topic_arn),
        })
    }
}

/// Closed set of lifecycle event kinds, with a catch-all for tags this version
/// does not understand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEventKind {
    DeviceCreated,
    DeviceDeleted,
    Unknown(String),
}

impl InventoryEventKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "DeviceCreated" => Self::DeviceCreated,
            "DeviceDeleted" => Self::DeviceDeleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DeviceCreated => "DeviceCreated",
            Self::DeviceDeleted => "DeviceDeleted",
            Self::Unknown(tag) => tag,
        }
    }
}

impl std::fmt::Display for InventoryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain representation of one device lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEvent {
    pub kind: InventoryEventKind,
    pub device_id: String,
    /// Display name published by the inventory API; diagnostic only
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct RawInventoryEvent {
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default, rename = "deviceId")]
    device_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl InventoryEvent {
    /// Decode the inner payload of a notification envelope
    pub fn from_json(payload: &str) -> Result<Self, DecodeError> {
        let raw: RawInventoryEvent =
            serde_json::from_str(payload).map_err(DecodeError::InvalidEvent)?;

        let kind = InventoryEventKind::from_tag(raw.event_type.as_deref().unwrap_or_default());
        let device_id = raw.device_id.unwrap_or_default();

        // Unknown kinds are ignored downstream, so only known kinds need a key
        if device_id.is_empty() && !matches!(kind, InventoryEventKind::Unknown(_)) {
            return Err(DecodeError::MissingDeviceId {
                event_type: kind.to_string(),
            });
        }

        Ok(Self {
            kind,
            device_id,
            name: raw.name,
        })
    }
}

/// Two-stage decode of a raw message body: envelope first, then the event it wraps
pub fn decode_message(body: &[u8]) -> Result<(NotificationEnvelope, InventoryEvent), DecodeError> {
    let envelope: NotificationEnvelope =
        serde_json::from_slice(body).map_err(DecodeError::InvalidEnvelope)?;
    let event = InventoryEvent::from_json(&envelope.message)?;
    Ok((envelope, event))
}
