use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;

/// Lifecycle state of an outbound message.
///
/// Transitions are monotonic: `Pending` moves once to `Sent` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
}

impl MessageStatus {
    pub const ALL: [MessageStatus; 3] = [Self::Pending, Self::Sent, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An outbound text message as held by the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Destination address (phone number).
    pub phone_number: String,
    pub content: String,
    pub status: MessageStatus,
    /// Set when the message reaches a terminal status.
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    /// A fresh pending message, as created upstream.
    pub fn pending(id: i64, phone_number: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            phone_number: phone_number.into(),
            content: content.into(),
            status: MessageStatus::Pending,
            sent_at: None,
        }
    }

    /// Body length in bytes, the unit the length limit is expressed in.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text_form() {
        for status in MessageStatus::ALL {
            assert_eq!(status.as_str().parse::<MessageStatus>().unwrap(), status);
        }
        assert_eq!(MessageStatus::Sent.to_string(), "sent");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "queued".parse::<MessageStatus>().unwrap_err();
        assert_eq!(err.0, "queued");
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&MessageStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }

    #[test]
    fn content_len_counts_bytes() {
        let msg = Message::pending(1, "+905551111111", "ünï");
        assert_eq!(msg.content_len(), 5);
        assert_eq!(msg.status, MessageStatus::Pending);
        assert!(msg.sent_at.is_none());
    }
}
