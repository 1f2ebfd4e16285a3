use serde::Deserialize;
use std::collections::HashMap;

/// Graph-style webhook: `entry[].changes[].value.{messages,statuses}[]`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphWebhook {
    pub entry: Vec<GraphEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEntry {
    #[serde(default)]
    pub changes: Vec<GraphChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: GraphValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphValue {
    #[serde(default)]
    pub messages: Vec<GraphMessage>,
    #[serde(default)]
    pub statuses: Vec<GraphStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessage {
    pub id: Option<String>,
    pub from: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub text: Option<GraphText>,
    pub image: Option<GraphMedia>,
    pub document: Option<GraphMedia>,
    /// Set by relays that already resolved the attachment to a URL.
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphMedia {
    pub id: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphStatus {
    pub id: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
}

/// Flat form-encoded webhook (`From`, `Body`, `MessageSid`, `NumMedia`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatFormWebhook {
    pub from: Option<String>,
    pub body: Option<String>,
    pub message_sid: Option<String>,
    pub num_media: Option<String>,
    pub media_url0: Option<String>,
    pub media_content_type0: Option<String>,
}

impl FlatFormWebhook {
    pub fn from_urlencoded(raw: &[u8]) -> Self {
        let fields: HashMap<String, String> = url::form_urlencoded::parse(raw)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::from_fields(&fields)
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned();
        Self {
            from: get("From"),
            body: get("Body"),
            message_sid: get("MessageSid").or_else(|| get("SmsMessageSid")),
            num_media: get("NumMedia"),
            media_url0: get("MediaUrl0"),
            media_content_type0: get("MediaContentType0"),
        }
    }
}
