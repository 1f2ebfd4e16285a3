use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Position of a conversation in the intake dialogue.
///
/// Declaration order is the order of the happy path. Which of the optional
/// field states are visited is decided by the configured intake fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    WaitingForApply,
    WaitingForName,
    WaitingForEmail,
    WaitingForPhone,
    WaitingForCoverLetter,
    WaitingForCv,
    Completed,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::WaitingForApply => "waiting_for_apply",
            ConversationState::WaitingForName => "waiting_for_name",
            ConversationState::WaitingForEmail => "waiting_for_email",
            ConversationState::WaitingForPhone => "waiting_for_phone",
            ConversationState::WaitingForCoverLetter => "waiting_for_cover_letter",
            ConversationState::WaitingForCv => "waiting_for_cv",
            ConversationState::Completed => "completed",
        }
    }

    pub fn is_open(self) -> bool {
        self != ConversationState::Completed
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "waiting_for_apply" => ConversationState::WaitingForApply,
            "waiting_for_name" => ConversationState::WaitingForName,
            "waiting_for_email" => ConversationState::WaitingForEmail,
            "waiting_for_phone" => ConversationState::WaitingForPhone,
            "waiting_for_cover_letter" => ConversationState::WaitingForCoverLetter,
            "waiting_for_cv" => ConversationState::WaitingForCv,
            "completed" => ConversationState::Completed,
            other => {
                return Err(UnknownVariant {
                    kind: "conversation_state",
                    value: other.to_string(),
                })
            }
        };
        Ok(state)
    }
}

impl TryFrom<String> for ConversationState {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Review status, owned by the administrative side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Shortlisted,
    Selected,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Selected => "selected",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Capitalized form used in messages sent to applicants.
    pub fn title(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Selected => "Selected",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "shortlisted" => Ok(ApplicationStatus::Shortlisted),
            "selected" => Ok(ApplicationStatus::Selected),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownVariant {
                kind: "application_status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fields collected so far, before they are committed to the typed columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
}

/// A conversation in progress or a finished application. Both live in the
/// same row: `conversation_state == Completed` marks the latter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub whatsapp_number: String,
    pub internship_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub cover_letter: Option<String>,
    pub cv_storage_key: Option<String>,
    pub cv_original_filename: Option<String>,
    #[sqlx(try_from = "String")]
    pub conversation_state: ConversationState,
    pub temp_data: Json<IntakeDraft>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    #[serde(skip_serializing)]
    pub email_hash: Option<String>,
    pub is_duplicate: bool,
    pub original_application_id: Option<Uuid>,
    pub duplicate_reason: Option<String>,
    pub duplicate_checked_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// A fresh conversation for `sender`, waiting for an APPLY command.
    pub fn open(sender: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            whatsapp_number: sender.to_string(),
            internship_id: None,
            full_name: None,
            email: None,
            phone_number: None,
            cover_letter: None,
            cv_storage_key: None,
            cv_original_filename: None,
            conversation_state: ConversationState::WaitingForApply,
            temp_data: Json(IntakeDraft::default()),
            status: ApplicationStatus::Pending,
            email_hash: None,
            is_duplicate: false,
            original_application_id: None,
            duplicate_reason: None,
            duplicate_checked_at: None,
            applied_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.conversation_state == ConversationState::Completed
    }

    pub fn draft(&self) -> &IntakeDraft {
        &self.temp_data.0
    }
}
