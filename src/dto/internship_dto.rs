use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::internship::Internship;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInternshipPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ShareMessage {
    pub internship_id: Uuid,
    pub apply_command: String,
    pub whatsapp_link: String,
    pub message: String,
}

/// Admin view of an internship. Includes the secret code.
#[derive(Debug, Serialize)]
pub struct InternshipView {
    #[serde(flatten)]
    pub internship: Internship,
    pub is_open: bool,
}
