use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::internship_dto::{CreateInternshipPayload, ShareMessage};
use crate::error::{Error, Result};
use crate::models::internship::Internship;
use crate::utils::codes::{generate_position_code, generate_secret_code};
use crate::utils::time::format_long_date;

const CODE_ATTEMPTS: usize = 5;
const SHARE_EXCERPT_CHARS: usize = 100;

#[async_trait]
pub trait InternshipDirectory: Send + Sync {
    /// Active internship matching both codes exactly.
    async fn find_active(&self, position_code: &str, secret_code: &str) -> Result<Option<Internship>>;
    async fn get(&self, id: Uuid) -> Result<Option<Internship>>;
    async fn list_active(&self) -> Result<Vec<Internship>>;
    async fn create(&self, payload: &CreateInternshipPayload) -> Result<Internship>;
    async fn regenerate_secret(&self, id: Uuid) -> Result<Internship>;
    async fn deactivate(&self, id: Uuid) -> Result<Internship>;
    /// Stops accepting applications for every internship past its deadline.
    /// Returns how many were closed.
    async fn close_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub struct InternshipService {
    pool: PgPool,
}

impl InternshipService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, payload: &CreateInternshipPayload, position_code: &str) -> Result<Internship> {
        let internship = sqlx::query_as::<_, Internship>(
            r#"
            INSERT INTO internships (title, description, requirements, position_code, secret_code, deadline)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payload.title.trim())
        .bind(&payload.description)
        .bind(&payload.requirements)
        .bind(position_code)
        .bind(generate_secret_code())
        .bind(payload.deadline)
        .fetch_one(&self.pool)
        .await?;
        Ok(internship)
    }
}

#[async_trait]
impl InternshipDirectory for InternshipService {
    async fn find_active(&self, position_code: &str, secret_code: &str) -> Result<Option<Internship>> {
        let internship = sqlx::query_as::<_, Internship>(
            r#"
            SELECT * FROM internships
            WHERE position_code = $1 AND secret_code = $2 AND is_active
            "#,
        )
        .bind(position_code)
        .bind(secret_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(internship)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Internship>> {
        let internship = sqlx::query_as::<_, Internship>("SELECT * FROM internships WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(internship)
    }

    async fn list_active(&self) -> Result<Vec<Internship>> {
        let internships = sqlx::query_as::<_, Internship>(
            "SELECT * FROM internships WHERE is_active ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(internships)
    }

    async fn create(&self, payload: &CreateInternshipPayload) -> Result<Internship> {
        for _ in 0..CODE_ATTEMPTS {
            let position_code = generate_position_code();
            match self.insert(payload, &position_code).await {
                Ok(internship) => {
                    info!(internship_id = %internship.id, position_code = %internship.position_code, "Created internship");
                    return Ok(internship);
                }
                Err(Error::Conflict(_)) => {
                    warn!(position_code = %position_code, "Position code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Internal("Could not allocate a unique position code".to_string()))
    }

    async fn regenerate_secret(&self, id: Uuid) -> Result<Internship> {
        let internship = sqlx::query_as::<_, Internship>(
            r#"
            UPDATE internships SET secret_code = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(generate_secret_code())
        .fetch_one(&self.pool)
        .await?;
        Ok(internship)
    }

    async fn deactivate(&self, id: Uuid) -> Result<Internship> {
        let internship = sqlx::query_as::<_, Internship>(
            r#"
            UPDATE internships SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(internship)
    }

    async fn close_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE internships SET accepting_applications = FALSE, updated_at = NOW()
            WHERE accepting_applications AND deadline < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(SHARE_EXCERPT_CHARS).collect()
}

/// Ready-to-post announcement with a `wa.me` link that pre-fills the APPLY command.
pub fn share_message(internship: &Internship, whatsapp_number: &str) -> ShareMessage {
    let apply_command = internship.apply_command();
    let digits: String = whatsapp_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let text: String = url::form_urlencoded::byte_serialize(apply_command.as_bytes()).collect();
    let whatsapp_link = format!("https://wa.me/{}?text={}", digits, text);

    let message = format!(
        "🎯 *{}* - Apply Now!\n\n📝 *Description:* {}...\n\n✅ *Requirements:* {}...\n\n📅 *Deadline:* {}\n\n🚀 *Apply via WhatsApp:*\n{}\n\nOr send manually: {}\nTo: {}\n\n#internship #jobs #opportunity",
        internship.title,
        excerpt(&internship.description),
        excerpt(&internship.requirements),
        format_long_date(internship.deadline),
        whatsapp_link,
        apply_command,
        whatsapp_number,
    );

    ShareMessage {
        internship_id: internship.id,
        apply_command,
        whatsapp_link,
        message,
    }
}
