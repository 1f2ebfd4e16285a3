use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row in the append-only inbound message log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InboundMessageLog {
    pub id: Uuid,
    pub message_id: String,
    pub from_number: String,
    pub to_number: String,
    pub message_type: String,
    pub message_body: Option<String>,
    pub media_url: Option<String>,
    pub media_content_type: Option<String>,
    /// Processing state: `received`, `processed` or `failed`.
    pub status: String,
    pub received_at: DateTime<Utc>,
    /// When the current processing attempt started.
    pub claimed_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Last provider receipt (`delivered`, `read`, ...), kept apart from `status`.
    pub delivery_status: Option<String>,
    pub delivery_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Document,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Document => "document",
        }
    }
}

/// Where an attachment can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaRef {
    /// Directly downloadable URL (flat form payloads).
    Url(String),
    /// Provider media id that must be resolved to a URL first (graph payloads).
    ProviderId(String),
}

impl MediaRef {
    pub fn as_str(&self) -> &str {
        match self {
            MediaRef::Url(url) => url,
            MediaRef::ProviderId(id) => id,
        }
    }
}

/// Provider-independent form of one inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: String,
    pub message_id: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub body: Option<String>,
    pub media: Option<MediaRef>,
    pub media_content_type: Option<String>,
}

impl InboundMessage {
    /// Body stored in the log; attachments get a placeholder like `[DOCUMENT_ATTACHMENT]`.
    pub fn log_body(&self) -> Option<String> {
        match self.kind {
            MessageKind::Text => self.body.clone(),
            kind => Some(format!("[{}_ATTACHMENT]", kind.as_str().to_uppercase())),
        }
    }
}

/// Delivery receipt for a message we sent earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message_id: String,
    pub status: String,
}
