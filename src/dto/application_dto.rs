use serde::{Deserialize, Serialize};

use crate::models::application::ApplicationStatus;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub id: uuid::Uuid,
    pub status: ApplicationStatus,
    pub changed: bool,
    pub notified: bool,
}
