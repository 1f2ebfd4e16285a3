use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::{Application, ApplicationStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    pub internship_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    /// Include conversations that have not completed yet.
    #[serde(default)]
    pub include_open: bool,
}

/// Outcome of one duplicate check, written back by [`ApplicationStore::record_duplicate_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMark {
    pub original_application_id: Uuid,
    pub reason: String,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// The sender's non-completed record, if any.
    async fn open_for_sender(&self, sender: &str) -> Result<Option<Application>>;
    /// Inserts a new record. Fails with `Error::Conflict` if the sender already
    /// has an open conversation.
    async fn insert(&self, application: &Application) -> Result<Application>;
    /// Writes the conversation-owned columns of `application`.
    async fn save(&self, application: &Application) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Application>>;
    async fn completed_for(&self, internship_id: Uuid, sender: &str) -> Result<Option<Application>>;
    async fn completed_for_internship(&self, internship_id: Uuid) -> Result<Vec<Application>>;
    /// Completed records that were never run through the duplicate detector.
    async fn unchecked_completed(&self) -> Result<Vec<Application>>;
    /// Stamps the check time and, for a match, the duplicate flag. Records
    /// that are already flagged are left untouched.
    async fn record_duplicate_check(
        &self,
        id: Uuid,
        mark: Option<&DuplicateMark>,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>>;
    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<Application>;
}

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
}

impl ApplicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for ApplicationService {
    async fn open_for_sender(&self, sender: &str) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE whatsapp_number = $1 AND conversation_state <> 'completed'
            "#,
        )
        .bind(sender)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn insert(&self, application: &Application) -> Result<Application> {
        let row = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (id, whatsapp_number, conversation_state, temp_data, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(application.id)
        .bind(&application.whatsapp_number)
        .bind(application.conversation_state.as_str())
        .bind(&application.temp_data)
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save(&self, application: &Application) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET internship_id = $2,
                full_name = $3,
                email = $4,
                phone_number = $5,
                cover_letter = $6,
                cv_storage_key = $7,
                cv_original_filename = $8,
                conversation_state = $9,
                temp_data = $10,
                email_hash = $11,
                applied_at = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(application.id)
        .bind(application.internship_id)
        .bind(&application.full_name)
        .bind(&application.email)
        .bind(&application.phone_number)
        .bind(&application.cover_letter)
        .bind(&application.cv_storage_key)
        .bind(&application.cv_original_filename)
        .bind(application.conversation_state.as_str())
        .bind(&application.temp_data)
        .bind(&application.email_hash)
        .bind(application.applied_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(application)
    }

    async fn completed_for(&self, internship_id: Uuid, sender: &str) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE internship_id = $1 AND whatsapp_number = $2 AND conversation_state = 'completed'
            "#,
        )
        .bind(internship_id)
        .bind(sender)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn completed_for_internship(&self, internship_id: Uuid) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE internship_id = $1 AND conversation_state = 'completed'
            ORDER BY COALESCE(applied_at, created_at) ASC, id ASC
            "#,
        )
        .bind(internship_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn unchecked_completed(&self) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE conversation_state = 'completed' AND duplicate_checked_at IS NULL
            ORDER BY COALESCE(applied_at, created_at) ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn record_duplicate_check(
        &self,
        id: Uuid,
        mark: Option<&DuplicateMark>,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET is_duplicate = $2,
                original_application_id = $3,
                duplicate_reason = $4,
                duplicate_checked_at = $5
            WHERE id = $1 AND is_duplicate = FALSE
            "#,
        )
        .bind(id)
        .bind(mark.is_some())
        .bind(mark.map(|m| m.original_application_id))
        .bind(mark.map(|m| m.reason.clone()))
        .bind(checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE ($1::uuid IS NULL OR internship_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3 OR conversation_state = 'completed')
            ORDER BY COALESCE(applied_at, created_at) DESC
            "#,
        )
        .bind(filter.internship_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.include_open)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn update_status(&self, id: Uuid, status: ApplicationStatus) -> Result<Application> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(application)
    }
}
