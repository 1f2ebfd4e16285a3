pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    application_service::{ApplicationService, ApplicationStore},
    conversation_flow::IntakeFlow,
    duplicate_service::DuplicateService,
    email_service::{HttpMailer, MailRelayConfig, Mailer},
    intake_service::IntakeService,
    internship_service::{InternshipDirectory, InternshipService},
    media_service::{HttpMediaFetcher, LocalBlobStore, MediaAuth, MediaIntake},
    message_service::{MessageLog, MessageService},
    notification_service::{NotificationLogService, Notifier, WhatsappNotifier, WhatsappTransport},
    review_service::ReviewService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;

/// Upper bound on the message claim lease (one week).
const MAX_CLAIM_LEASE_SECS: u64 = 7 * 24 * 60 * 60;

/// Everything the intake core talks to, behind trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub applications: Arc<dyn ApplicationStore>,
    pub internships: Arc<dyn InternshipDirectory>,
    pub messages: Arc<dyn MessageLog>,
    pub media: MediaIntake,
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub applications: Arc<dyn ApplicationStore>,
    pub internships: Arc<dyn InternshipDirectory>,
    pub intake_service: IntakeService,
    pub duplicate_service: DuplicateService,
    pub review_service: ReviewService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let notification_log = NotificationLogService::new(pool.clone());
        let notifier = WhatsappNotifier::new(
            http_client.clone(),
            WhatsappTransport::from_config(&config),
            Some(notification_log.clone()),
        );
        let relay = config.mail_api_url.clone().map(|url| MailRelayConfig {
            url,
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        });
        let mailer = HttpMailer::new(http_client.clone(), relay, Some(notification_log));

        let url_auth = match (&config.twilio_account_sid, &config.twilio_auth_token) {
            (Some(sid), Some(token)) => Some(MediaAuth::Basic {
                username: sid.clone(),
                password: token.clone(),
            }),
            _ => config.whatsapp_access_token.clone().map(MediaAuth::Bearer),
        };
        let fetcher = HttpMediaFetcher::new(
            http_client,
            config.graph_api_base.clone(),
            config.whatsapp_access_token.clone(),
            url_auth,
        );
        let media = MediaIntake::new(
            Arc::new(fetcher),
            Arc::new(LocalBlobStore::new(&config.uploads_dir)),
        );

        let deps = Collaborators {
            applications: Arc::new(ApplicationService::new(pool.clone())),
            internships: Arc::new(InternshipService::new(pool.clone())),
            messages: Arc::new(MessageService::new(pool)),
            media,
            notifier: Arc::new(notifier),
            mailer: Arc::new(mailer),
        };
        Ok(Self::from_parts(config, deps))
    }

    /// Wires the services over arbitrary collaborators.
    pub fn from_parts(config: Config, deps: Collaborators) -> Self {
        let flow = IntakeFlow::new(config.intake_fields.clone());
        let duplicate_service = DuplicateService::new(deps.applications.clone());
        let review_service = ReviewService::new(
            deps.applications.clone(),
            deps.internships.clone(),
            deps.notifier.clone(),
            deps.mailer.clone(),
        );
        let applications = deps.applications.clone();
        let internships = deps.internships.clone();
        let intake_service = IntakeService::new(flow, deps, config.whatsapp_number.clone())
            .with_claim_lease(chrono::Duration::seconds(
                config.message_claim_lease_secs.min(MAX_CLAIM_LEASE_SECS) as i64,
            ));

        Self {
            config: Arc::new(config),
            applications,
            internships,
            intake_service,
            duplicate_service,
            review_service,
        }
    }
}
