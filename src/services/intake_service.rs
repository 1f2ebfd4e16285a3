//! Drives inbound messages through the intake dialogue.
//!
//! For each message: dedupe against the message log, take the sender's lock,
//! load or open the sender's conversation, resolve whatever the next step
//! needs, persist the new state and only then run the replies, emails and
//! duplicate check that the step produced.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::application::{Application, ConversationState};
use crate::models::inbound_message::{DeliveryStatus, InboundMessage};
use crate::services::conversation_flow::{ApplyLookup, Effect, Event, IntakeFlow, Step};
use crate::services::duplicate_service::DuplicateService;
use crate::services::message_service::ProcessingStatus;
use crate::services::normalizer::NormalizedPayload;
use crate::services::sender_locks::SenderLocks;
use crate::utils::time;
use crate::Collaborators;

const UNKNOWN_INTERNSHIP_TITLE: &str = "the internship";
pub const DEFAULT_CLAIM_LEASE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The message id was handled before.
    Duplicate,
    Processed {
        application_id: Uuid,
        state: ConversationState,
    },
}

#[derive(Clone)]
pub struct IntakeService {
    flow: IntakeFlow,
    deps: Collaborators,
    duplicates: DuplicateService,
    locks: SenderLocks,
    inbound_number: String,
    claim_lease: Duration,
}

impl IntakeService {
    pub fn new(flow: IntakeFlow, deps: Collaborators, inbound_number: impl Into<String>) -> Self {
        let duplicates = DuplicateService::new(deps.applications.clone());
        Self {
            flow,
            deps,
            duplicates,
            locks: SenderLocks::new(),
            inbound_number: inbound_number.into(),
            claim_lease: Duration::seconds(DEFAULT_CLAIM_LEASE_SECS as i64),
        }
    }

    /// How long a claimed message may stay unfinished before a redelivery
    /// of the same id is processed again.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn flow(&self) -> &IntakeFlow {
        &self.flow
    }

    /// Handles everything in a normalized webhook body. Failures are logged
    /// per item and never abort the rest of the batch.
    pub async fn handle_payload(&self, payload: NormalizedPayload) {
        for status in &payload.statuses {
            self.apply_status(status).await;
        }
        for message in &payload.messages {
            if let Err(e) = self.handle_message(message).await {
                error!(
                    sender = %message.sender,
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to process inbound message"
                );
            }
        }
    }

    async fn apply_status(&self, status: &DeliveryStatus) {
        match self.deps.messages.apply_delivery_status(status).await {
            Ok(true) => debug!(message_id = %status.message_id, status = %status.status, "Delivery status recorded"),
            Ok(false) => debug!(message_id = %status.message_id, "Delivery status for unknown message"),
            Err(e) => warn!(message_id = %status.message_id, error = %e, "Failed to record delivery status"),
        }
    }

    pub async fn handle_message(&self, message: &InboundMessage) -> Result<MessageOutcome> {
        let now = time::now();
        let claimed = self
            .deps
            .messages
            .record(message, &self.inbound_number, now, now - self.claim_lease)
            .await?;
        if !claimed {
            info!(message_id = %message.message_id, "Skipping already handled message");
            return Ok(MessageOutcome::Duplicate);
        }

        let _guard = self.locks.acquire(&message.sender).await;
        let result = self.process(message).await;
        let status = match &result {
            Ok(_) => ProcessingStatus::Processed,
            Err(_) => ProcessingStatus::Failed,
        };
        if let Err(e) = self.deps.messages.finish(&message.message_id, status).await {
            warn!(message_id = %message.message_id, error = %e, "Failed to update message log");
        }
        result
    }

    async fn process(&self, message: &InboundMessage) -> Result<MessageOutcome> {
        let now = time::now();
        let application = self.open_conversation(&message.sender, now).await?;
        let state = application.conversation_state;

        let mut stored_key = None;
        let event = match self.flow.plan(state, message) {
            Step::Ignore => {
                return Ok(MessageOutcome::Processed {
                    application_id: application.id,
                    state,
                })
            }
            Step::Ready(event) => event,
            Step::LookupInternship {
                position_code,
                secret_code,
            } => Event::Apply(
                self.lookup(&position_code, &secret_code, &message.sender, now)
                    .await?,
            ),
            Step::FetchCv { media, .. } => {
                match self.deps.media.store_cv(media.as_ref(), &message.sender).await {
                    Ok(cv) => {
                        stored_key = Some(cv.storage_key.clone());
                        let internship_title = self.internship_title(&application).await;
                        Event::CvStored { cv, internship_title }
                    }
                    Err(e) => {
                        warn!(sender = %message.sender, error = %e, "Failed to fetch CV");
                        Event::CvFetchFailed
                    }
                }
            }
        };

        let outcome = self.flow.transition(&application, event, now);
        if outcome.changed {
            if let Err(e) = self.deps.applications.save(&outcome.application).await {
                if let Some(key) = stored_key {
                    self.deps.media.discard(&key).await;
                }
                return Err(e);
            }
        }

        let next = outcome.application.conversation_state;
        if next != state {
            info!(
                sender = %message.sender,
                application_id = %outcome.application.id,
                from = %state,
                to = %next,
                "Conversation advanced"
            );
        }
        self.run_effects(&outcome.application, &outcome.effects, now).await;

        Ok(MessageOutcome::Processed {
            application_id: outcome.application.id,
            state: next,
        })
    }

    /// The sender's open conversation, created on first contact.
    async fn open_conversation(&self, sender: &str, now: DateTime<Utc>) -> Result<Application> {
        if let Some(application) = self.deps.applications.open_for_sender(sender).await? {
            return Ok(application);
        }
        match self.deps.applications.insert(&Application::open(sender, now)).await {
            Ok(application) => {
                info!(sender, application_id = %application.id, "Opened conversation");
                Ok(application)
            }
            // Another process opened it first.
            Err(Error::Conflict(_)) => self
                .deps
                .applications
                .open_for_sender(sender)
                .await?
                .ok_or_else(|| Error::Internal(format!("No open conversation for {}", sender))),
            Err(e) => Err(e),
        }
    }

    async fn lookup(
        &self,
        position_code: &str,
        secret_code: &str,
        sender: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyLookup> {
        let Some(internship) = self
            .deps
            .internships
            .find_active(position_code, secret_code)
            .await?
        else {
            info!(sender, position_code, "APPLY with unknown codes");
            return Ok(ApplyLookup::NotFound);
        };

        if !internship.accepting_applications || internship.is_deadline_passed(now) {
            return Ok(ApplyLookup::DeadlinePassed {
                title: internship.title,
            });
        }
        if let Some(existing) = self
            .deps
            .applications
            .completed_for(internship.id, sender)
            .await?
        {
            return Ok(ApplyLookup::AlreadyApplied {
                title: internship.title,
                status: existing.status,
            });
        }
        Ok(ApplyLookup::Open {
            internship_id: internship.id,
            title: internship.title,
            deadline: internship.deadline,
        })
    }

    async fn internship_title(&self, application: &Application) -> String {
        let Some(id) = application.internship_id else {
            return UNKNOWN_INTERNSHIP_TITLE.to_string();
        };
        match self.deps.internships.get(id).await {
            Ok(Some(internship)) => internship.title,
            Ok(None) => UNKNOWN_INTERNSHIP_TITLE.to_string(),
            Err(e) => {
                warn!(internship_id = %id, error = %e, "Failed to load internship title");
                UNKNOWN_INTERNSHIP_TITLE.to_string()
            }
        }
    }

    async fn run_effects(&self, application: &Application, effects: &[Effect], now: DateTime<Utc>) {
        for effect in effects {
            match effect {
                Effect::Reply(text) => {
                    if !self.deps.notifier.send(&application.whatsapp_number, text).await {
                        warn!(sender = %application.whatsapp_number, "Reply was not delivered");
                    }
                }
                Effect::ConfirmationEmail { to, subject, body } => {
                    if !self.deps.mailer.send(to, subject, body).await {
                        warn!(application_id = %application.id, "Confirmation email was not delivered");
                    }
                }
                Effect::CheckDuplicates => {
                    if let Err(e) = self.duplicates.check(application, now).await {
                        warn!(application_id = %application.id, error = %e, "Duplicate check failed");
                    }
                }
            }
        }
    }
}
