use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::models::notification_log::{Channel, CreateNotificationLog};
use crate::services::notification_service::NotificationLogService;

/// Best-effort email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub from: Option<String>,
}

/// Sends mail through an HTTP relay. Without a relay URL every send is a
/// logged no-op returning `false`.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    relay: Option<MailRelayConfig>,
    log: Option<NotificationLogService>,
}

impl HttpMailer {
    pub fn new(client: Client, relay: Option<MailRelayConfig>, log: Option<NotificationLogService>) -> Self {
        if relay.is_none() {
            info!("Mail relay not configured; confirmation emails are disabled");
        }
        Self { client, relay, log }
    }

    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String> {
        let Some(relay) = &self.relay else {
            return Err("Email relay not configured".to_string());
        };
        let mut request = self.client.post(&relay.url).json(&json!({
            "from": relay.from,
            "to": recipient,
            "subject": subject,
            "text": body,
        }));
        if let Some(key) = &relay.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.map_err(|e| e.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("mail relay answered {}", resp.status()))
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
        let (sent, error_message) = match self.deliver(recipient, subject, body).await {
            Ok(()) => {
                info!(recipient, subject, "Email sent");
                (true, None)
            }
            Err(reason) => {
                warn!(recipient, error = %reason, "Failed to send email");
                (false, Some(reason))
            }
        };
        if let Some(log) = &self.log {
            log.record(
                CreateNotificationLog {
                    application_id: None,
                    channel: Channel::Email,
                    recipient: recipient.to_string(),
                    message: body.to_string(),
                    error_message,
                },
                sent,
            )
            .await;
        }
        sent
    }
}
