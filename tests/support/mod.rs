#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use internship_intake::{
    config::{Config, IntakeField, WhatsappProvider},
    dto::internship_dto::CreateInternshipPayload,
    error::{Error, Result},
    models::{
        application::{Application, ApplicationStatus},
        inbound_message::{DeliveryStatus, InboundMessage, MediaRef, MessageKind},
        internship::Internship,
    },
    services::{
        application_service::{ApplicationFilter, ApplicationStore, DuplicateMark},
        email_service::Mailer,
        internship_service::InternshipDirectory,
        media_service::{BlobStore, FetchedMedia, MediaError, MediaFetcher, MediaIntake},
        message_service::{MessageLog, ProcessingStatus},
        notification_service::Notifier,
    },
    AppState, Collaborators,
};

pub const ADMIN_KEY: &str = "admin-test-key";
pub const VERIFY_TOKEN: &str = "verify-test-token";
pub const PDF_BYTES: &[u8] = b"%PDF-1.4 test cv";

pub fn test_config(fields: Vec<IntakeField>) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "postgres://unused".into(),
        admin_api_key: ADMIN_KEY.into(),
        whatsapp_provider: WhatsappProvider::Twilio,
        whatsapp_verify_token: VERIFY_TOKEN.into(),
        whatsapp_access_token: None,
        whatsapp_phone_number_id: None,
        whatsapp_number: "+15550001111".into(),
        graph_api_base: "http://graph.invalid".into(),
        twilio_account_sid: None,
        twilio_auth_token: None,
        twilio_whatsapp_from: "whatsapp:+14155238886".into(),
        twilio_api_base: "http://twilio.invalid".into(),
        mail_api_url: None,
        mail_api_key: None,
        mail_from: None,
        uploads_dir: "./uploads".into(),
        intake_fields: fields,
        deadline_sweep_secs: 60,
        message_claim_lease_secs: 300,
    }
}

#[derive(Default)]
pub struct MemoryApplications {
    rows: Mutex<Vec<Application>>,
    pub fail_saves: AtomicBool,
}

impl MemoryApplications {
    pub fn all(&self) -> Vec<Application> {
        self.rows.lock().unwrap().clone()
    }

    pub fn by_id(&self, id: Uuid) -> Application {
        self.all().into_iter().find(|a| a.id == id).expect("application exists")
    }

    pub fn for_sender(&self, sender: &str) -> Vec<Application> {
        self.all()
            .into_iter()
            .filter(|a| a.whatsapp_number == sender)
            .collect()
    }

    pub fn put(&self, application: Application) {
        self.rows.lock().unwrap().push(application);
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplications {
    async fn open_for_sender(&self, sender: &str) -> Result<Option<Application>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.whatsapp_number == sender && !a.is_completed())
            .cloned())
    }

    async fn insert(&self, application: &Application) -> Result<Application> {
        let mut rows = self.rows.lock().unwrap();
        if !application.is_completed()
            && rows
                .iter()
                .any(|a| a.whatsapp_number == application.whatsapp_number && !a.is_completed())
        {
            return Err(Error::Conflict("open conversation exists".into()));
        }
        rows.push(application.clone());
        Ok(application.clone())
    }

    async fn save(&self, application: &Application) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Internal("storage unavailable".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        if application.is_completed()
            && rows.iter().any(|a| {
                a.id != application.id
                    && a.is_completed()
                    && a.internship_id == application.internship_id
                    && a.whatsapp_number == application.whatsapp_number
            })
        {
            return Err(Error::Conflict("already completed".into()));
        }
        let row = rows
            .iter_mut()
            .find(|a| a.id == application.id)
            .ok_or_else(|| Error::NotFound("application".into()))?;
        let (status, is_duplicate, original, reason, checked) = (
            row.status,
            row.is_duplicate,
            row.original_application_id,
            row.duplicate_reason.clone(),
            row.duplicate_checked_at,
        );
        *row = application.clone();
        row.status = status;
        row.is_duplicate = is_duplicate;
        row.original_application_id = original;
        row.duplicate_reason = reason;
        row.duplicate_checked_at = checked;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Application>> {
        Ok(self.rows.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn completed_for(&self, internship_id: Uuid, sender: &str) -> Result<Option<Application>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| {
                a.is_completed() && a.internship_id == Some(internship_id) && a.whatsapp_number == sender
            })
            .cloned())
    }

    async fn completed_for_internship(&self, internship_id: Uuid) -> Result<Vec<Application>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.is_completed() && a.internship_id == Some(internship_id))
            .cloned()
            .collect())
    }

    async fn unchecked_completed(&self) -> Result<Vec<Application>> {
        let mut rows: Vec<Application> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.is_completed() && a.duplicate_checked_at.is_none())
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.applied_at.unwrap_or(a.created_at), a.id));
        Ok(rows)
    }

    async fn record_duplicate_check(
        &self,
        id: Uuid,
        mark: Option<&DuplicateMark>,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|a| a.id == id && !a.is_duplicate) {
            row.is_duplicate = mark.is_some();
            row.original_application_id = mark.map(|m| m.original_application_id);
            row.duplicate_reason = mark.map(|m| m.reason.clone());
            row.duplicate_checked_at = Some(checked_at);
        }
        Ok(())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|a| filter.internship_id.map_or(true, |id| a.internship_id == Some(id)))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.include_open || a.is_completed())
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<Application> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
        row.status = status;
        Ok(row.clone())
    }
}

#[derive(Default)]
pub struct MemoryInternships {
    rows: Mutex<Vec<Internship>>,
}

impl MemoryInternships {
    pub fn add(&self, title: &str, position_code: &str, secret_code: &str, deadline: DateTime<Utc>) -> Internship {
        let now = Utc::now();
        let internship = Internship {
            id: Uuid::new_v4(),
            title: title.into(),
            description: format!("{} description", title),
            requirements: "Curiosity".into(),
            position_code: position_code.into(),
            secret_code: secret_code.into(),
            deadline,
            is_active: true,
            accepting_applications: true,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(internship.clone());
        internship
    }

    pub fn open(&self, title: &str, position_code: &str, secret_code: &str) -> Internship {
        self.add(title, position_code, secret_code, Utc::now() + Duration::days(30))
    }

    fn update<F: FnOnce(&mut Internship)>(&self, id: Uuid, f: F) -> Result<Internship> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
        f(row);
        Ok(row.clone())
    }
}

#[async_trait]
impl InternshipDirectory for MemoryInternships {
    async fn find_active(&self, position_code: &str, secret_code: &str) -> Result<Option<Internship>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.is_active && i.position_code == position_code && i.secret_code == secret_code)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Internship>> {
        Ok(self.rows.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Internship>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.is_active)
            .cloned()
            .collect())
    }

    async fn create(&self, payload: &CreateInternshipPayload) -> Result<Internship> {
        let position = internship_intake::utils::codes::generate_position_code();
        let secret = internship_intake::utils::codes::generate_secret_code();
        Ok(self.add(&payload.title, &position, &secret, payload.deadline))
    }

    async fn regenerate_secret(&self, id: Uuid) -> Result<Internship> {
        self.update(id, |i| {
            i.secret_code = internship_intake::utils::codes::generate_secret_code()
        })
    }

    async fn deactivate(&self, id: Uuid) -> Result<Internship> {
        self.update(id, |i| i.is_active = false)
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut closed = 0;
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.accepting_applications && row.deadline < now {
                row.accepting_applications = false;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[derive(Default)]
pub struct MemoryMessages {
    rows: Mutex<HashMap<String, LoggedMessage>>,
}

struct LoggedMessage {
    status: String,
    claimed_at: DateTime<Utc>,
    delivery_status: Option<String>,
}

impl MemoryMessages {
    pub fn status_of(&self, message_id: &str) -> Option<String> {
        self.rows.lock().unwrap().get(message_id).map(|row| row.status.clone())
    }

    pub fn delivery_of(&self, message_id: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(message_id)
            .and_then(|row| row.delivery_status.clone())
    }
}

#[async_trait]
impl MessageLog for MemoryMessages {
    async fn record(
        &self,
        message: &InboundMessage,
        _to_number: &str,
        now: DateTime<Utc>,
        reclaim_before: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&message.message_id) {
            None => {
                rows.insert(
                    message.message_id.clone(),
                    LoggedMessage { status: "received".into(), claimed_at: now, delivery_status: None },
                );
                Ok(true)
            }
            Some(row)
                if row.status == "failed"
                    || (row.status == "received" && row.claimed_at < reclaim_before) =>
            {
                row.status = "received".into();
                row.claimed_at = now;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    async fn finish(&self, message_id: &str, status: ProcessingStatus) -> Result<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(message_id) {
            row.status = status.as_str().to_string();
        }
        Ok(())
    }

    async fn apply_delivery_status(&self, status: &DeliveryStatus) -> Result<bool> {
        match self.rows.lock().unwrap().get_mut(&status.message_id) {
            Some(row) => {
                row.delivery_status = Some(status.status.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Serves [`PDF_BYTES`] unless told to fail. With `hang_once` set, the next
/// fetch never completes.
#[derive(Default)]
pub struct StubFetcher {
    pub fail: AtomicBool,
    pub hang_once: AtomicBool,
    pub body: Mutex<Option<Vec<u8>>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, _media: &MediaRef) -> std::result::Result<FetchedMedia, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_once.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediaError::Status(500));
        }
        let body = self
            .body
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| PDF_BYTES.to_vec());
        Ok(FetchedMedia {
            bytes: Bytes::from(body),
            content_type: Some("application/pdf".into()),
        })
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    files: Mutex<HashMap<String, Vec<u8>>>,
    next: AtomicUsize,
}

impl MemoryBlobs {
    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn persist(&self, bytes: &[u8], extension: &str) -> std::result::Result<String, MediaError> {
        let key = format!("cv/{}.{}", self.next.fetch_add(1, Ordering::SeqCst), extension);
        self.files.lock().unwrap().insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn remove(&self, key: &str) {
        self.files.lock().unwrap().remove(key);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn to(&self, recipient: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_to(&self, recipient: &str) -> String {
        self.to(recipient).pop().unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, text: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        true
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string(), body.to_string()));
        true
    }
}

pub struct Harness {
    pub state: AppState,
    pub applications: Arc<MemoryApplications>,
    pub internships: Arc<MemoryInternships>,
    pub messages: Arc<MemoryMessages>,
    pub fetcher: Arc<StubFetcher>,
    pub blobs: Arc<MemoryBlobs>,
    pub notifier: Arc<RecordingNotifier>,
    pub mailer: Arc<RecordingMailer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fields(vec![IntakeField::FullName, IntakeField::Email])
    }

    pub fn with_fields(fields: Vec<IntakeField>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        Self::build(fields, notifier.clone(), notifier)
    }

    pub fn with_config(config: Config) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        Self::from_config(config, notifier.clone(), notifier)
    }

    /// Uses `outbound` for replies while keeping a recorder around for assertions.
    pub fn build(
        fields: Vec<IntakeField>,
        outbound: Arc<dyn Notifier>,
        notifier: Arc<RecordingNotifier>,
    ) -> Self {
        Self::from_config(test_config(fields), outbound, notifier)
    }

    fn from_config(config: Config, outbound: Arc<dyn Notifier>, notifier: Arc<RecordingNotifier>) -> Self {
        let applications = Arc::new(MemoryApplications::default());
        let internships = Arc::new(MemoryInternships::default());
        let messages = Arc::new(MemoryMessages::default());
        let fetcher = Arc::new(StubFetcher::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let mailer = Arc::new(RecordingMailer::default());

        let deps = Collaborators {
            applications: applications.clone(),
            internships: internships.clone(),
            messages: messages.clone(),
            media: MediaIntake::new(fetcher.clone(), blobs.clone()),
            notifier: outbound,
            mailer: mailer.clone(),
        };
        let state = AppState::from_parts(config, deps);

        Self {
            state,
            applications,
            internships,
            messages,
            fetcher,
            blobs,
            notifier,
            mailer,
        }
    }
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub fn message_id() -> String {
    format!("msg-{}", NEXT_ID.fetch_add(1, Ordering::SeqCst))
}

pub fn text(sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        sender: sender.into(),
        message_id: message_id(),
        kind: MessageKind::Text,
        timestamp: Utc::now(),
        body: Some(body.into()),
        media: None,
        media_content_type: None,
    }
}

pub fn document(sender: &str, content_type: &str) -> InboundMessage {
    InboundMessage {
        sender: sender.into(),
        message_id: message_id(),
        kind: MessageKind::Document,
        timestamp: Utc::now(),
        body: None,
        media: Some(MediaRef::ProviderId("media-1".into())),
        media_content_type: Some(content_type.into()),
    }
}
