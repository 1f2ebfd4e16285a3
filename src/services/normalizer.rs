//! Turns provider webhook bodies into [`InboundMessage`] values.
//!
//! Two payload shapes are understood: the nested graph JSON shape and the
//! flat form-encoded shape. Anything else normalizes to an empty payload;
//! normalization never fails.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dto::webhook_dto::{FlatFormWebhook, GraphMessage, GraphWebhook};
use crate::models::inbound_message::{DeliveryStatus, InboundMessage, MediaRef, MessageKind};
use crate::utils::time::from_epoch_str;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SENDER_PREFIX: &str = "whatsapp:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedPayload {
    pub messages: Vec<InboundMessage>,
    pub statuses: Vec<DeliveryStatus>,
}

impl NormalizedPayload {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.statuses.is_empty()
    }
}

/// Normalizes a raw webhook body. `content_type` picks the parser; without
/// one, JSON is tried first and form encoding second.
pub fn normalize(content_type: Option<&str>, body: &[u8], now: DateTime<Utc>) -> NormalizedPayload {
    let is_form = content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
        .unwrap_or(false);
    if is_form {
        return normalize_form(&FlatFormWebhook::from_urlencoded(body), now);
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => normalize_json(&value, now),
        Err(_) if content_type.is_none() => normalize_form(&FlatFormWebhook::from_urlencoded(body), now),
        Err(err) => {
            debug!(error = %err, "webhook body is not JSON");
            NormalizedPayload::default()
        }
    }
}

pub fn normalize_json(value: &serde_json::Value, now: DateTime<Utc>) -> NormalizedPayload {
    let webhook: GraphWebhook = match serde_json::from_value(value.clone()) {
        Ok(webhook) => webhook,
        Err(err) => {
            debug!(error = %err, "unrecognized JSON webhook shape");
            return NormalizedPayload::default();
        }
    };

    let mut payload = NormalizedPayload::default();
    for change in webhook.entry.into_iter().flat_map(|entry| entry.changes) {
        if change.field != "messages" {
            debug!(field = %change.field, "ignoring non-message change");
            continue;
        }
        payload
            .messages
            .extend(change.value.messages.into_iter().filter_map(|m| graph_message(m, now)));
        payload
            .statuses
            .extend(change.value.statuses.into_iter().filter_map(|s| {
                Some(DeliveryStatus {
                    message_id: s.id?,
                    status: s.status?,
                })
            }));
    }
    payload
}

fn graph_message(message: GraphMessage, now: DateTime<Utc>) -> Option<InboundMessage> {
    let message_id = message.id?;
    let sender = clean_sender(&message.from?)?;
    let timestamp = message
        .timestamp
        .as_deref()
        .and_then(from_epoch_str)
        .unwrap_or(now);

    let message_type = message.message_type.as_deref().unwrap_or("text");
    let (kind, media) = match message_type {
        "text" => {
            let body = message.text.map(|t| t.body.trim().to_string()).unwrap_or_default();
            return Some(InboundMessage {
                sender,
                message_id,
                kind: MessageKind::Text,
                timestamp,
                body: Some(body),
                media: None,
                media_content_type: None,
            });
        }
        "image" => (MessageKind::Image, message.image),
        "document" => (MessageKind::Document, message.document),
        other => {
            debug!(message_id = %message_id, message_type = other, "ignoring unsupported message type");
            return None;
        }
    };

    let media_content_type = media.as_ref().and_then(|m| m.mime_type.clone());
    let media_ref = match message.media_url {
        Some(url) if !url.is_empty() => Some(MediaRef::Url(url)),
        _ => media.and_then(|m| m.id).map(MediaRef::ProviderId),
    };

    Some(InboundMessage {
        sender,
        message_id,
        kind,
        timestamp,
        body: None,
        media: media_ref,
        media_content_type,
    })
}

pub fn normalize_form(form: &FlatFormWebhook, now: DateTime<Utc>) -> NormalizedPayload {
    let Some(sender) = form.from.as_deref().and_then(clean_sender) else {
        return NormalizedPayload::default();
    };
    let message_id = form
        .message_sid
        .clone()
        .filter(|sid| !sid.is_empty())
        .unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4()));
    let num_media = form
        .num_media
        .as_deref()
        .and_then(|n| n.trim().parse::<u32>().ok())
        .unwrap_or(0);

    let message = match (&form.media_url0, num_media) {
        (Some(url), n) if n > 0 && !url.is_empty() => {
            let content_type = form.media_content_type0.clone();
            let kind = match content_type.as_deref() {
                Some(ct) if ct.starts_with("image/") => MessageKind::Image,
                _ => MessageKind::Document,
            };
            InboundMessage {
                sender,
                message_id,
                kind,
                timestamp: now,
                body: form.body.clone().filter(|b| !b.trim().is_empty()),
                media: Some(MediaRef::Url(url.clone())),
                media_content_type: content_type,
            }
        }
        _ => InboundMessage {
            sender,
            message_id,
            kind: MessageKind::Text,
            timestamp: now,
            body: Some(form.body.clone().unwrap_or_default().trim().to_string()),
            media: None,
            media_content_type: None,
        },
    };

    NormalizedPayload {
        messages: vec![message],
        statuses: Vec::new(),
    }
}

fn clean_sender(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let sender = trimmed.strip_prefix(SENDER_PREFIX).unwrap_or(trimmed).trim();
    (!sender.is_empty()).then(|| sender.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        from_epoch_str("1700000000").unwrap()
    }

    #[test]
    fn graph_text_message() {
        let body = json!({
            "entry": [{ "changes": [{ "field": "messages", "value": { "messages": [{
                "id": "wamid.1", "from": "263771234567", "timestamp": "1699990000",
                "type": "text", "text": { "body": "  APPLY ABC123 SEC999 " }
            }]}}]}]
        });
        let payload = normalize_json(&body, now());
        assert_eq!(payload.messages.len(), 1);
        let msg = &payload.messages[0];
        assert_eq!(msg.sender, "263771234567");
        assert_eq!(msg.message_id, "wamid.1");
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.body.as_deref(), Some("APPLY ABC123 SEC999"));
        assert_eq!(msg.timestamp.timestamp(), 1_699_990_000);
    }

    #[test]
    fn graph_document_carries_provider_media_id() {
        let body = json!({
            "entry": [{ "changes": [{ "field": "messages", "value": { "messages": [{
                "id": "wamid.2", "from": "263771234567", "timestamp": "1699990000",
                "type": "document", "document": { "id": "media-77", "mime_type": "application/pdf" }
            }]}}]}]
        });
        let msg = normalize_json(&body, now()).messages.remove(0);
        assert_eq!(msg.kind, MessageKind::Document);
        assert_eq!(msg.media, Some(MediaRef::ProviderId("media-77".into())));
        assert_eq!(msg.media_content_type.as_deref(), Some("application/pdf"));
        assert_eq!(msg.log_body().as_deref(), Some("[DOCUMENT_ATTACHMENT]"));
    }

    #[test]
    fn graph_statuses_and_foreign_fields() {
        let body = json!({
            "entry": [
                { "changes": [{ "field": "account_update", "value": { "messages": [{ "id": "x", "from": "1" }] } }] },
                { "changes": [{ "field": "messages", "value": { "statuses": [
                    { "id": "wamid.out", "status": "delivered", "timestamp": "1699990000" },
                    { "status": "read" }
                ]}}]}
            ]
        });
        let payload = normalize_json(&body, now());
        assert!(payload.messages.is_empty());
        assert_eq!(
            payload.statuses,
            vec![DeliveryStatus { message_id: "wamid.out".into(), status: "delivered".into() }]
        );
    }

    #[test]
    fn unsupported_types_and_incomplete_messages_are_dropped() {
        let body = json!({
            "entry": [{ "changes": [{ "field": "messages", "value": { "messages": [
                { "id": "a", "from": "1", "type": "audio", "audio": { "id": "m" } },
                { "from": "1", "type": "text", "text": { "body": "hi" } }
            ]}}]}]
        });
        assert!(normalize_json(&body, now()).is_empty());
    }

    #[test]
    fn flat_form_text_and_media() {
        let text = normalize(
            Some("application/x-www-form-urlencoded"),
            b"From=whatsapp%3A%2B263771234567&Body=Jane+Doe&MessageSid=SM1&NumMedia=0",
            now(),
        );
        let msg = &text.messages[0];
        assert_eq!(msg.sender, "+263771234567");
        assert_eq!(msg.message_id, "SM1");
        assert_eq!(msg.body.as_deref(), Some("Jane Doe"));
        assert_eq!(msg.kind, MessageKind::Text);

        let media = normalize(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"From=whatsapp%3A%2B263771234567&MessageSid=SM2&NumMedia=1&MediaUrl0=https%3A%2F%2Fmedia.example%2Fcv&MediaContentType0=application%2Fpdf",
            now(),
        );
        let msg = &media.messages[0];
        assert_eq!(msg.kind, MessageKind::Document);
        assert_eq!(msg.media, Some(MediaRef::Url("https://media.example/cv".into())));
        assert_eq!(msg.media_content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn flat_form_image_is_classified_by_content_type() {
        let payload = normalize(
            Some("application/x-www-form-urlencoded"),
            b"From=%2B1555&MessageSid=SM3&NumMedia=1&MediaUrl0=https%3A%2F%2Fm%2F1&MediaContentType0=image%2Fjpeg",
            now(),
        );
        assert_eq!(payload.messages[0].kind, MessageKind::Image);
    }

    #[test]
    fn malformed_payloads_normalize_to_nothing() {
        assert!(normalize(Some("application/json"), b"{not json", now()).is_empty());
        assert!(normalize(Some("application/json"), br#"{"hello":"world"}"#, now()).is_empty());
        assert!(normalize(None, b"", now()).is_empty());
        assert!(normalize(Some("application/x-www-form-urlencoded"), b"Body=hi", now()).is_empty());
    }
}
