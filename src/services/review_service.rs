use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::dto::application_dto::StatusUpdateResponse;
use crate::error::{Error, Result};
use crate::models::application::ApplicationStatus;
use crate::services::application_service::ApplicationStore;
use crate::services::email_service::Mailer;
use crate::services::internship_service::InternshipDirectory;
use crate::services::notification_service::Notifier;

/// Administrative status changes, optionally announced to the applicant.
#[derive(Clone)]
pub struct ReviewService {
    applications: Arc<dyn ApplicationStore>,
    internships: Arc<dyn InternshipDirectory>,
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn Mailer>,
}

impl ReviewService {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        internships: Arc<dyn InternshipDirectory>,
        notifier: Arc<dyn Notifier>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            applications,
            internships,
            notifier,
            mailer,
        }
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        notify: bool,
    ) -> Result<StatusUpdateResponse> {
        let current = self
            .applications
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;
        let changed = current.status != status;
        let updated = self.applications.update_status(id, status).await?;
        info!(application_id = %id, from = current.status.as_str(), to = status.as_str(), "Application status updated");

        let mut notified = false;
        if notify && changed {
            let title = match updated.internship_id {
                Some(internship_id) => self
                    .internships
                    .get(internship_id)
                    .await?
                    .map(|i| i.title)
                    .unwrap_or_else(|| "your internship".to_string()),
                None => "your internship".to_string(),
            };
            let message = format!(
                "Your application for {} has been updated to: {}",
                title,
                status.title()
            );
            notified = self.notifier.send(&updated.whatsapp_number, &message).await;
            // Placeholder addresses have no hash and are not mailed.
            if let (Some(email), Some(_)) = (updated.email.as_deref(), &updated.email_hash) {
                self.mailer
                    .send(email, &format!("Application Status Update - {}", title), &message)
                    .await;
            }
        }

        Ok(StatusUpdateResponse {
            id,
            status: updated.status,
            changed,
            notified,
        })
    }
}
