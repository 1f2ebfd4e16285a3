//! Flags completed applications that look like a resubmission by someone who
//! already applied to the same internship from another WhatsApp number.
//!
//! Two rules, checked in order against earlier completed applications:
//! the same email hash, or a full-name similarity ratio above
//! [`NAME_SIMILARITY_THRESHOLD`]. Only the first flag sticks; flagged
//! records are never re-evaluated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::Application;
use crate::services::application_service::{ApplicationStore, DuplicateMark};
use crate::services::conversation_flow::PLACEHOLDER_NAME;
use crate::utils::similarity::name_ratio;

pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

fn order_key(application: &Application) -> (DateTime<Utc>, Uuid) {
    (
        application.applied_at.unwrap_or(application.created_at),
        application.id,
    )
}

fn comparable_name(application: &Application) -> Option<&str> {
    application
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != PLACEHOLDER_NAME)
}

/// Decides whether `candidate` duplicates one of `peers`. Only completed
/// peers for the same internship, from a different sender and submitted
/// before the candidate, can be the original.
pub fn assess(candidate: &Application, peers: &[Application]) -> Option<DuplicateMark> {
    let internship_id = candidate.internship_id?;
    let key = order_key(candidate);
    let mut earlier: Vec<&Application> = peers
        .iter()
        .filter(|peer| {
            peer.id != candidate.id
                && peer.is_completed()
                && peer.internship_id == Some(internship_id)
                && peer.whatsapp_number != candidate.whatsapp_number
                && order_key(peer) < key
        })
        .collect();
    earlier.sort_by_key(|peer| order_key(peer));

    if let Some(hash) = candidate.email_hash.as_deref() {
        if let Some(original) = earlier
            .iter()
            .find(|peer| peer.email_hash.as_deref() == Some(hash))
        {
            return Some(DuplicateMark {
                original_application_id: original.id,
                reason: format!(
                    "Same email as application {} submitted from a different WhatsApp number",
                    original.id
                ),
            });
        }
    }

    let name = comparable_name(candidate)?;
    let mut best: Option<(&Application, f64)> = None;
    for peer in &earlier {
        let Some(other) = comparable_name(peer) else {
            continue;
        };
        let score = name_ratio(name, other);
        if score > NAME_SIMILARITY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((*peer, score));
        }
    }
    best.map(|(original, score)| DuplicateMark {
        original_application_id: original.id,
        reason: format!(
            "Name {:.0}% similar to application {} submitted from a different WhatsApp number",
            score * 100.0,
            original.id
        ),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub checked: usize,
    pub flagged: usize,
}

#[derive(Clone)]
pub struct DuplicateService {
    applications: Arc<dyn ApplicationStore>,
}

impl DuplicateService {
    pub fn new(applications: Arc<dyn ApplicationStore>) -> Self {
        Self { applications }
    }

    /// Checks one completed application and records the result.
    pub async fn check(&self, application: &Application, now: DateTime<Utc>) -> Result<Option<DuplicateMark>> {
        if application.is_duplicate || !application.is_completed() {
            return Ok(None);
        }
        let Some(internship_id) = application.internship_id else {
            return Ok(None);
        };

        let peers = self.applications.completed_for_internship(internship_id).await?;
        let mark = assess(application, &peers);
        self.applications
            .record_duplicate_check(application.id, mark.as_ref(), now)
            .await?;

        if let Some(mark) = &mark {
            info!(
                application_id = %application.id,
                original_application_id = %mark.original_application_id,
                reason = %mark.reason,
                "Flagged duplicate application"
            );
        }
        Ok(mark)
    }

    /// Runs [`check`](Self::check) over every completed application that has
    /// not been checked yet, oldest first.
    pub async fn scan_unchecked(&self, now: DateTime<Utc>) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        for application in self.applications.unchecked_completed().await? {
            match self.check(&application, now).await {
                Ok(mark) => {
                    summary.checked += 1;
                    if mark.is_some() {
                        summary.flagged += 1;
                    }
                }
                Err(e) => warn!(application_id = %application.id, error = %e, "Duplicate check failed"),
            }
        }
        info!(checked = summary.checked, flagged = summary.flagged, "Duplicate scan finished");
        Ok(summary)
    }
}
