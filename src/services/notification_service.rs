use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::config::{Config, WhatsappProvider};
use crate::models::notification_log::{Channel, CreateNotificationLog};

/// Outbound chat messages to applicants. Failures are reported as `false`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> bool;
}

/// Persists one row per outbound attempt in `notification_logs`.
#[derive(Clone)]
pub struct NotificationLogService {
    pool: PgPool,
}

impl NotificationLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: CreateNotificationLog, sent: bool) {
        let status = match (sent, &entry.error_message) {
            (true, _) => "sent",
            (false, Some(_)) => "failed",
            (false, None) => "pending",
        };
        let res = sqlx::query(
            r#"
            INSERT INTO notification_logs (application_id, channel, recipient, message, status, error_message, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $5 = 'sent' THEN NOW() ELSE NULL END)
            "#,
        )
        .bind(entry.application_id)
        .bind(entry.channel.as_str())
        .bind(&entry.recipient)
        .bind(&entry.message)
        .bind(status)
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await;
        if let Err(e) = res {
            error!(error = ?e, "Failed to log notification");
        }
    }
}

#[derive(Debug, Clone)]
pub enum WhatsappTransport {
    Twilio {
        api_base: String,
        account_sid: String,
        auth_token: String,
        from: String,
    },
    Cloud {
        api_base: String,
        phone_number_id: String,
        access_token: String,
    },
    /// Credentials missing: messages are logged but not sent.
    Unconfigured,
}

impl WhatsappTransport {
    pub fn from_config(config: &Config) -> Self {
        match config.whatsapp_provider {
            WhatsappProvider::Twilio => match (&config.twilio_account_sid, &config.twilio_auth_token) {
                (Some(sid), Some(token)) => WhatsappTransport::Twilio {
                    api_base: config.twilio_api_base.trim_end_matches('/').to_string(),
                    account_sid: sid.clone(),
                    auth_token: token.clone(),
                    from: config.twilio_whatsapp_from.clone(),
                },
                _ => WhatsappTransport::Unconfigured,
            },
            WhatsappProvider::Cloud => {
                match (&config.whatsapp_phone_number_id, &config.whatsapp_access_token) {
                    (Some(id), Some(token)) => WhatsappTransport::Cloud {
                        api_base: config.graph_api_base.trim_end_matches('/').to_string(),
                        phone_number_id: id.clone(),
                        access_token: token.clone(),
                    },
                    _ => WhatsappTransport::Unconfigured,
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct WhatsappNotifier {
    client: Client,
    transport: WhatsappTransport,
    log: Option<NotificationLogService>,
}

impl WhatsappNotifier {
    pub fn new(client: Client, transport: WhatsappTransport, log: Option<NotificationLogService>) -> Self {
        if matches!(transport, WhatsappTransport::Unconfigured) {
            warn!("WhatsApp credentials not configured; outbound messages will only be logged");
        }
        Self { client, transport, log }
    }

    async fn deliver(&self, recipient: &str, text: &str) -> Result<(), String> {
        let resp = match &self.transport {
            WhatsappTransport::Twilio {
                api_base,
                account_sid,
                auth_token,
                from,
            } => {
                let to = format!("whatsapp:{}", recipient);
                self.client
                    .post(format!("{}/Accounts/{}/Messages.json", api_base, account_sid))
                    .basic_auth(account_sid, Some(auth_token))
                    .form(&[("From", from.as_str()), ("To", to.as_str()), ("Body", text)])
                    .send()
                    .await
            }
            WhatsappTransport::Cloud {
                api_base,
                phone_number_id,
                access_token,
            } => {
                self.client
                    .post(format!("{}/{}/messages", api_base, phone_number_id))
                    .bearer_auth(access_token)
                    .json(&json!({
                        "messaging_product": "whatsapp",
                        "to": recipient,
                        "type": "text",
                        "text": { "body": text },
                    }))
                    .send()
                    .await
            }
            WhatsappTransport::Unconfigured => return Err("Credentials not configured".to_string()),
        };

        let resp = resp.map_err(|e| e.to_string())?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(format!("provider answered {}: {}", status, body))
        }
    }
}

#[async_trait]
impl Notifier for WhatsappNotifier {
    async fn send(&self, recipient: &str, text: &str) -> bool {
        let result = self.deliver(recipient, text).await;
        let (sent, error_message) = match result {
            Ok(()) => {
                info!(recipient, "WhatsApp message sent");
                (true, None)
            }
            Err(reason) if matches!(self.transport, WhatsappTransport::Unconfigured) => {
                info!(recipient, text, "WhatsApp message not sent (no credentials)");
                (false, Some(reason))
            }
            Err(reason) => {
                warn!(recipient, error = %reason, "Failed to send WhatsApp message");
                (false, Some(reason))
            }
        };

        if let Some(log) = &self.log {
            log.record(
                CreateNotificationLog {
                    application_id: None,
                    channel: Channel::Whatsapp,
                    recipient: recipient.to_string(),
                    message: text.to_string(),
                    error_message,
                },
                sent,
            )
            .await;
        }
        sent
    }
}
