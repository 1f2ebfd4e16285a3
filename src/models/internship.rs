use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Internship {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub position_code: String,
    pub secret_code: String,
    pub deadline: DateTime<Utc>,
    pub is_active: bool,
    pub accepting_applications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Internship {
    pub fn is_deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Open means active, still flagged as accepting and not past its deadline.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.accepting_applications && !self.is_deadline_passed(now)
    }

    pub fn apply_command(&self) -> String {
        format!("APPLY {} {}", self.position_code, self.secret_code)
    }
}
