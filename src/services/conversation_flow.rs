//! The intake dialogue as a pure transition function.
//!
//! [`IntakeFlow::plan`] inspects the current state and an inbound message and
//! says what has to be resolved (internship lookup, CV download) before the
//! step can be taken. [`IntakeFlow::transition`] then computes the updated
//! record and the side effects to run once it has been persisted. Nothing in
//! here performs I/O.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::config::IntakeField;
use crate::models::application::{Application, ApplicationStatus, ConversationState, IntakeDraft};
use crate::models::inbound_message::{InboundMessage, MediaRef, MessageKind};
use crate::utils::crypto::email_hash;
use crate::utils::time::format_long_date;

pub const PLACEHOLDER_NAME: &str = "Details in CV";
const MIN_NAME_LEN: usize = 2;
const MIN_PHONE_LEN: usize = 8;
const MIN_COVER_LETTER_LEN: usize = 20;
// Column widths of full_name, email and phone_number.
const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 200;
const MAX_PHONE_LEN: usize = 32;

/// What must happen before a message can be turned into an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ready(Event),
    LookupInternship {
        position_code: String,
        secret_code: String,
    },
    FetchCv {
        media: Option<MediaRef>,
        content_type: Option<String>,
    },
    /// Completed conversations take no further input.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Apply(ApplyLookup),
    /// Attachment that is not a PDF while a CV is expected.
    RejectedAttachment,
    /// Attachment sent while some other input is expected.
    UnexpectedAttachment,
    CvStored {
        cv: StoredCv,
        internship_title: String,
    },
    CvFetchFailed,
}

/// Result of resolving an `APPLY <position> <secret>` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyLookup {
    NotFound,
    DeadlinePassed {
        title: String,
    },
    AlreadyApplied {
        title: String,
        status: ApplicationStatus,
    },
    Open {
        internship_id: Uuid,
        title: String,
        deadline: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCv {
    pub storage_key: String,
    pub display_filename: String,
}

/// Side effects of a transition, run after the record has been saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(String),
    ConfirmationEmail {
        to: String,
        subject: String,
        body: String,
    },
    CheckDuplicates,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub application: Application,
    /// False when the record is unchanged and does not need to be written.
    pub changed: bool,
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn stay(application: &Application, reply: impl Into<String>) -> Self {
        Self {
            application: application.clone(),
            changed: false,
            effects: vec![Effect::Reply(reply.into())],
        }
    }

    pub fn replies(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Reply(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Parses `APPLY <POSITION_CODE> <SECRET_CODE>`, case-insensitively.
pub fn parse_apply_command(text: &str) -> Option<(String, String)> {
    let upper = text.to_uppercase();
    let parts: Vec<&str> = upper.split_whitespace().collect();
    match parts.as_slice() {
        ["APPLY", position, secret] => Some((position.to_string(), secret.to_string())),
        _ => None,
    }
}

pub fn is_valid_email(text: &str) -> bool {
    match text.trim().split_once('@') {
        Some((_, domain)) => domain.contains('.'),
        None => false,
    }
}

pub fn is_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false)
}

fn field_for_state(state: ConversationState) -> Option<IntakeField> {
    match state {
        ConversationState::WaitingForName => Some(IntakeField::FullName),
        ConversationState::WaitingForEmail => Some(IntakeField::Email),
        ConversationState::WaitingForPhone => Some(IntakeField::Phone),
        ConversationState::WaitingForCoverLetter => Some(IntakeField::CoverLetter),
        _ => None,
    }
}

fn state_for_field(field: IntakeField) -> ConversationState {
    match field {
        IntakeField::FullName => ConversationState::WaitingForName,
        IntakeField::Email => ConversationState::WaitingForEmail,
        IntakeField::Phone => ConversationState::WaitingForPhone,
        IntakeField::CoverLetter => ConversationState::WaitingForCoverLetter,
    }
}

fn field_prompt(field: IntakeField) -> &'static str {
    match field {
        IntakeField::FullName => "👤 Please send your *full name*:",
        IntakeField::Email => "📧 Now please provide your *email address*:",
        IntakeField::Phone => "📱 Now please provide your *phone number*:",
        IntakeField::CoverLetter => {
            "💬 Now please write a short *cover letter* (tell us why you want this internship):"
        }
    }
}

fn field_reprompt(field: IntakeField) -> &'static str {
    match field {
        IntakeField::FullName => "Please provide your full name (2 to 200 characters):",
        IntakeField::Email => "Please provide a valid email address:",
        IntakeField::Phone => "Please provide a valid phone number (8 to 32 characters):",
        IntakeField::CoverLetter => {
            "Please provide a more detailed cover letter (at least 20 characters). Tell us why you want this internship:"
        }
    }
}

/// Accepts `input` for `field`, returning the value to store.
fn accept_field(field: IntakeField, input: &str) -> Option<String> {
    let value = input.trim();
    let len = value.chars().count();
    let ok = match field {
        IntakeField::FullName => (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len),
        IntakeField::Email => len <= MAX_EMAIL_LEN && is_valid_email(value),
        IntakeField::Phone => (MIN_PHONE_LEN..=MAX_PHONE_LEN).contains(&len),
        IntakeField::CoverLetter => len >= MIN_COVER_LETTER_LEN,
    };
    ok.then(|| value.to_string())
}

fn store_field(draft: &mut IntakeDraft, field: IntakeField, value: String) {
    match field {
        IntakeField::FullName => draft.full_name = Some(value),
        IntakeField::Email => draft.email = Some(value),
        IntakeField::Phone => draft.phone_number = Some(value),
        IntakeField::CoverLetter => draft.cover_letter = Some(value),
    }
}

pub const USAGE_PROMPT: &str = "🚀 *Welcome to our Internship Application System!*\n\n📝 To apply for an internship, please send:\n*APPLY [POSITION_CODE] [SECRET_CODE]*\n\n💡 *Example:* APPLY WD001 SECRET123\n\n🔍 Make sure you have the correct codes from the job posting!";
pub const INVALID_CODES: &str = "❌ Invalid position code or secret code. Please check your details and try again.";
pub const CV_PROMPT: &str = "📎 *Final step:* please attach your *CV* as a PDF document.";
pub const CV_REMINDER: &str = "📎 Please attach your *CV* as a PDF document to complete your application.";
pub const PDF_ONLY: &str = "⚠️ We only accept CVs in *PDF* format. Please send your CV as a PDF document.";
pub const CV_FETCH_FAILED: &str = "Error processing your file. Please try uploading again.";

/// The dialogue for one deployment's configured field list.
#[derive(Debug, Clone)]
pub struct IntakeFlow {
    fields: Vec<IntakeField>,
}

impl IntakeFlow {
    pub fn new(mut fields: Vec<IntakeField>) -> Self {
        fields.sort();
        fields.dedup();
        Self { fields }
    }

    pub fn fields(&self) -> &[IntakeField] {
        &self.fields
    }

    /// First state after a successful APPLY.
    pub fn first_state(&self) -> ConversationState {
        self.fields
            .first()
            .map(|f| state_for_field(*f))
            .unwrap_or(ConversationState::WaitingForCv)
    }

    /// State following `field`, skipping fields that are not configured.
    pub fn state_after(&self, field: IntakeField) -> ConversationState {
        self.fields
            .iter()
            .find(|f| **f > field)
            .map(|f| state_for_field(*f))
            .unwrap_or(ConversationState::WaitingForCv)
    }

    fn prompt_for(&self, state: ConversationState) -> &'static str {
        match state {
            ConversationState::WaitingForApply => USAGE_PROMPT,
            ConversationState::WaitingForCv => CV_PROMPT,
            ConversationState::Completed => "",
            other => field_for_state(other).map(field_prompt).unwrap_or(USAGE_PROMPT),
        }
    }

    pub fn plan(&self, state: ConversationState, message: &InboundMessage) -> Step {
        match (state, message.kind) {
            (ConversationState::Completed, _) => Step::Ignore,
            (ConversationState::WaitingForApply, MessageKind::Text) => {
                let text = message.body.clone().unwrap_or_default();
                match parse_apply_command(&text) {
                    Some((position_code, secret_code)) => Step::LookupInternship {
                        position_code,
                        secret_code,
                    },
                    None => Step::Ready(Event::Text(text)),
                }
            }
            (_, MessageKind::Text) => Step::Ready(Event::Text(message.body.clone().unwrap_or_default())),
            (ConversationState::WaitingForCv, _) => {
                if is_pdf(message.media_content_type.as_deref()) {
                    Step::FetchCv {
                        media: message.media.clone(),
                        content_type: message.media_content_type.clone(),
                    }
                } else {
                    Step::Ready(Event::RejectedAttachment)
                }
            }
            (_, _) => Step::Ready(Event::UnexpectedAttachment),
        }
    }

    pub fn transition(&self, application: &Application, event: Event, now: DateTime<Utc>) -> Outcome {
        let state = application.conversation_state;
        match (state, event) {
            (ConversationState::Completed, _) => Outcome {
                application: application.clone(),
                changed: false,
                effects: Vec::new(),
            },
            (ConversationState::WaitingForApply, Event::Apply(lookup)) => {
                self.on_apply(application, lookup, now)
            }
            (ConversationState::WaitingForApply, _) => Outcome::stay(application, USAGE_PROMPT),
            (ConversationState::WaitingForCv, Event::CvStored { cv, internship_title }) => {
                self.complete(application, cv, &internship_title, now)
            }
            (ConversationState::WaitingForCv, Event::CvFetchFailed) => {
                Outcome::stay(application, CV_FETCH_FAILED)
            }
            (ConversationState::WaitingForCv, Event::RejectedAttachment) => {
                Outcome::stay(application, PDF_ONLY)
            }
            (ConversationState::WaitingForCv, _) => Outcome::stay(application, CV_REMINDER),
            (state, Event::Text(text)) => match field_for_state(state) {
                Some(field) => self.on_field(application, field, &text, now),
                None => Outcome::stay(application, self.prompt_for(state)),
            },
            (state, _) => Outcome::stay(application, self.prompt_for(state)),
        }
    }

    fn on_apply(&self, application: &Application, lookup: ApplyLookup, now: DateTime<Utc>) -> Outcome {
        match lookup {
            ApplyLookup::NotFound => Outcome::stay(application, INVALID_CODES),
            ApplyLookup::DeadlinePassed { title } => Outcome::stay(
                application,
                format!("Sorry, the application deadline for {} has passed.", title),
            ),
            ApplyLookup::AlreadyApplied { title, status } => Outcome::stay(
                application,
                format!(
                    "You have already applied for {}. Your application status is: {}",
                    title,
                    status.title()
                ),
            ),
            ApplyLookup::Open {
                internship_id,
                title,
                deadline,
            } => {
                let mut next = application.clone();
                next.internship_id = Some(internship_id);
                next.temp_data = Json(IntakeDraft::default());
                next.conversation_state = self.first_state();
                next.updated_at = now;
                let reply = format!(
                    "🎉 Welcome! You're applying for: *{}*\n⏰ Deadline: {}\n\n{}",
                    title,
                    format_long_date(deadline),
                    self.prompt_for(next.conversation_state)
                );
                Outcome {
                    application: next,
                    changed: true,
                    effects: vec![Effect::Reply(reply)],
                }
            }
        }
    }

    fn on_field(
        &self,
        application: &Application,
        field: IntakeField,
        input: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        let Some(value) = accept_field(field, input) else {
            return Outcome::stay(application, field_reprompt(field));
        };

        let ack = match field {
            IntakeField::FullName => format!("✅ Thanks {}!", value),
            IntakeField::Email => "📧 Great! Email received.".to_string(),
            IntakeField::Phone => "📱 Perfect! Phone number saved.".to_string(),
            IntakeField::CoverLetter => "📝 Excellent! Your motivation is noted.".to_string(),
        };

        let mut next = application.clone();
        store_field(&mut next.temp_data.0, field, value);
        next.conversation_state = self.state_after(field);
        next.updated_at = now;
        let reply = format!("{}\n\n{}", ack, self.prompt_for(next.conversation_state));
        Outcome {
            application: next,
            changed: true,
            effects: vec![Effect::Reply(reply)],
        }
    }

    fn complete(
        &self,
        application: &Application,
        cv: StoredCv,
        internship_title: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        let draft = application.draft().clone();
        let mut next = application.clone();

        next.full_name = Some(draft.full_name.clone().unwrap_or_else(|| PLACEHOLDER_NAME.to_string()));
        next.email = Some(
            draft
                .email
                .clone()
                .unwrap_or_else(|| format!("cv_applicant_{}@pending.com", application.id)),
        );
        next.email_hash = draft.email.as_deref().map(email_hash);
        next.phone_number = Some(
            draft
                .phone_number
                .clone()
                .unwrap_or_else(|| application.whatsapp_number.clone()),
        );
        next.cover_letter = draft.cover_letter.clone();
        next.cv_storage_key = Some(cv.storage_key);
        next.cv_original_filename = Some(cv.display_filename);
        next.conversation_state = ConversationState::Completed;
        next.applied_at = Some(now);
        next.updated_at = now;

        let full_name = next.full_name.clone().unwrap_or_default();
        let mut summary = format!(
            "🎉 *APPLICATION COMPLETE!*\n\n📋 Position: {}\n👤 Name: {}\n",
            internship_title, full_name
        );
        if let Some(email) = &draft.email {
            summary.push_str(&format!("📧 Email: {}\n", email));
        }
        summary.push_str("📎 CV: Received ✅\n\n✅ Done! We'll review your application and contact you via WhatsApp.\n\n🤞 Good luck!");

        let mut effects = vec![Effect::Reply(summary)];
        if let Some(email) = draft.email {
            effects.push(Effect::ConfirmationEmail {
                to: email,
                subject: format!("Application Confirmation - {}", internship_title),
                body: format!(
                    "Dear {},\n\nYour application for {} has been successfully submitted.\n\nWe will review your application and get back to you soon.\n\nBest regards,\nThe Team",
                    full_name, internship_title
                ),
            });
        }
        effects.push(Effect::CheckDuplicates);

        Outcome {
            application: next,
            changed: true,
            effects,
        }
    }
}
