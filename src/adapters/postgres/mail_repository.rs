//! Postgres implementation of the MailIntegrationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    IntegrationStatus, MailIntegration, MailProcessingLog, MailProvider, ProcessingOutcome,
    Task, TaskPriority, TaskStatus,
};
use crate::domain::ports::{MailIngestOutcome, MailIntegrationRepository};

use super::task_repository::{insert_assignees, insert_task, TaskRow, TASK_COLUMNS};

#[derive(Clone)]
pub struct PgMailIntegrationRepository {
    pool: PgPool,
}

impl PgMailIntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailIntegrationRepository for PgMailIntegrationRepository {
    async fn upsert(&self, integration: &MailIntegration) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO mail_integrations (
                   id, user_id, provider, email_address, access_token_enc,
                   refresh_token_enc, key_id, token_expires_at, status,
                   last_sync_at, last_sync_message_id, sync_enabled,
                   poll_interval_minutes, folders, auto_create_tasks,
                   min_confidence, default_priority, default_status,
                   error_count, last_error, created_at, updated_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                         $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
               ON CONFLICT (user_id, provider) DO UPDATE SET
                   email_address = EXCLUDED.email_address,
                   access_token_enc = EXCLUDED.access_token_enc,
                   refresh_token_enc = EXCLUDED.refresh_token_enc,
                   key_id = EXCLUDED.key_id,
                   token_expires_at = EXCLUDED.token_expires_at,
                   status = EXCLUDED.status,
                   sync_enabled = EXCLUDED.sync_enabled,
                   poll_interval_minutes = EXCLUDED.poll_interval_minutes,
                   folders = EXCLUDED.folders,
                   auto_create_tasks = EXCLUDED.auto_create_tasks,
                   min_confidence = EXCLUDED.min_confidence,
                   default_priority = EXCLUDED.default_priority,
                   default_status = EXCLUDED.default_status,
                   error_count = EXCLUDED.error_count,
                   last_error = EXCLUDED.last_error,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(integration.id)
        .bind(integration.user_id)
        .bind(integration.provider.as_str())
        .bind(&integration.email_address)
        .bind(&integration.access_token_enc)
        .bind(&integration.refresh_token_enc)
        .bind(&integration.key_id)
        .bind(integration.token_expires_at)
        .bind(integration.status.as_str())
        .bind(integration.last_sync_at)
        .bind(&integration.last_sync_message_id)
        .bind(integration.sync_enabled)
        .bind(integration.poll_interval_minutes)
        .bind(&integration.folders)
        .bind(integration.auto_create_tasks)
        .bind(integration.min_confidence)
        .bind(integration.default_priority.as_str())
        .bind(integration.default_status.as_str())
        .bind(integration.error_count)
        .bind(&integration.last_error)
        .bind(integration.created_at)
        .bind(integration.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<MailIntegration>> {
        let row: Option<MailIntegrationRow> =
            sqlx::query_as("SELECT * FROM mail_integrations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_for_user(
        &self,
        user_id: Uuid,
        provider: MailProvider,
    ) -> DomainResult<Option<MailIntegration>> {
        let row: Option<MailIntegrationRow> = sqlx::query_as(
            "SELECT * FROM mail_integrations WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, integration: &MailIntegration) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE mail_integrations SET
                   email_address = $1, access_token_enc = $2, refresh_token_enc = $3,
                   key_id = $4, token_expires_at = $5, status = $6, last_sync_at = $7,
                   last_sync_message_id = $8, sync_enabled = $9,
                   poll_interval_minutes = $10, folders = $11, auto_create_tasks = $12,
                   min_confidence = $13, default_priority = $14, default_status = $15,
                   error_count = $16, last_error = $17, updated_at = $18
               WHERE id = $19"#,
        )
        .bind(&integration.email_address)
        .bind(&integration.access_token_enc)
        .bind(&integration.refresh_token_enc)
        .bind(&integration.key_id)
        .bind(integration.token_expires_at)
        .bind(integration.status.as_str())
        .bind(integration.last_sync_at)
        .bind(&integration.last_sync_message_id)
        .bind(integration.sync_enabled)
        .bind(integration.poll_interval_minutes)
        .bind(&integration.folders)
        .bind(integration.auto_create_tasks)
        .bind(integration.min_confidence)
        .bind(integration.default_priority.as_str())
        .bind(integration.default_status.as_str())
        .bind(integration.error_count)
        .bind(&integration.last_error)
        .bind(integration.updated_at)
        .bind(integration.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IntegrationNotFound(integration.id.to_string()));
        }
        Ok(())
    }

    async fn list_syncable(&self) -> DomainResult<Vec<MailIntegration>> {
        let rows: Vec<MailIntegrationRow> = sqlx::query_as(
            r#"SELECT * FROM mail_integrations
               WHERE sync_enabled AND status = 'connected'
               ORDER BY last_sync_at ASC NULLS FIRST"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn is_processed(&self, integration_id: Uuid, message_id: &str) -> DomainResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                   SELECT 1 FROM mail_processing_logs
                   WHERE integration_id = $1 AND message_id = $2
               )"#,
        )
        .bind(integration_id)
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_log(&self, log: &MailProcessingLog) -> DomainResult<bool> {
        let result = insert_log_sql(log).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_task_with_log(
        &self,
        task: &Task,
        assignee_ids: &[Uuid],
        log: &MailProcessingLog,
    ) -> DomainResult<MailIngestOutcome> {
        let mut tx = self.pool.begin().await?;

        // The log insert carries the at-most-once guarantee: a conflict
        // means a concurrent pass already claimed this message, so the
        // whole transaction (including the task) backs out.
        let inserted = insert_log_sql(log).execute(&mut *tx).await?;
        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(MailIngestOutcome::Duplicate);
        }

        insert_task(&mut tx, task).await?;
        insert_assignees(&mut tx, task.id, assignee_ids).await?;
        tx.commit().await?;

        let stored: TaskRow = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(task.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(MailIngestOutcome::Created(stored.try_into()?))
    }

    async fn list_logs(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<MailProcessingLog>> {
        let rows: Vec<MailLogRow> = sqlx::query_as(
            r#"SELECT * FROM mail_processing_logs
               WHERE integration_id = $1
               ORDER BY processed_at DESC
               LIMIT $2"#,
        )
        .bind(integration_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

fn insert_log_sql(
    log: &MailProcessingLog,
) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"INSERT INTO mail_processing_logs (
               id, integration_id, message_id, subject, sender, message_date,
               processed_at, outcome, tasks_created, suggestions, confidence,
               extractor, retry_count
           ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
           ON CONFLICT (integration_id, message_id) DO NOTHING"#,
    )
    .bind(log.id)
    .bind(log.integration_id)
    .bind(&log.message_id)
    .bind(&log.subject)
    .bind(&log.sender)
    .bind(log.message_date)
    .bind(log.processed_at)
    .bind(log.outcome.as_str())
    .bind(log.tasks_created)
    .bind(&log.suggestions)
    .bind(log.confidence)
    .bind(&log.extractor)
    .bind(log.retry_count)
}

#[derive(sqlx::FromRow)]
struct MailIntegrationRow {
    id: Uuid,
    user_id: Uuid,
    provider: String,
    email_address: String,
    access_token_enc: Option<String>,
    refresh_token_enc: Option<String>,
    key_id: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    status: String,
    last_sync_at: Option<DateTime<Utc>>,
    last_sync_message_id: Option<String>,
    sync_enabled: bool,
    poll_interval_minutes: i32,
    folders: Vec<String>,
    auto_create_tasks: bool,
    min_confidence: f64,
    default_priority: String,
    default_status: String,
    error_count: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MailIntegrationRow> for MailIntegration {
    type Error = DomainError;

    fn try_from(row: MailIntegrationRow) -> Result<Self, Self::Error> {
        Ok(MailIntegration {
            id: row.id,
            user_id: row.user_id,
            provider: MailProvider::from_str(&row.provider).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown provider '{}'", row.provider))
            })?,
            email_address: row.email_address,
            access_token_enc: row.access_token_enc,
            refresh_token_enc: row.refresh_token_enc,
            key_id: row.key_id,
            token_expires_at: row.token_expires_at,
            status: IntegrationStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!(
                    "unknown integration status '{}'",
                    row.status
                ))
            })?,
            last_sync_at: row.last_sync_at,
            last_sync_message_id: row.last_sync_message_id,
            sync_enabled: row.sync_enabled,
            poll_interval_minutes: row.poll_interval_minutes,
            folders: row.folders,
            auto_create_tasks: row.auto_create_tasks,
            min_confidence: row.min_confidence,
            default_priority: TaskPriority::from_str(&row.default_priority)
                .unwrap_or(TaskPriority::Medium),
            default_status: TaskStatus::from_str(&row.default_status)
                .unwrap_or(TaskStatus::Todo),
            error_count: row.error_count,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MailLogRow {
    id: Uuid,
    integration_id: Uuid,
    message_id: String,
    subject: String,
    sender: String,
    message_date: Option<DateTime<Utc>>,
    processed_at: DateTime<Utc>,
    outcome: String,
    tasks_created: i32,
    suggestions: serde_json::Value,
    confidence: Option<f64>,
    extractor: String,
    retry_count: i32,
}

impl TryFrom<MailLogRow> for MailProcessingLog {
    type Error = DomainError;

    fn try_from(row: MailLogRow) -> Result<Self, Self::Error> {
        Ok(MailProcessingLog {
            id: row.id,
            integration_id: row.integration_id,
            message_id: row.message_id,
            subject: row.subject,
            sender: row.sender,
            message_date: row.message_date,
            processed_at: row.processed_at,
            outcome: ProcessingOutcome::from_str(&row.outcome).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown outcome '{}'", row.outcome))
            })?,
            tasks_created: row.tasks_created,
            suggestions: row.suggestions,
            confidence: row.confidence,
            extractor: row.extractor,
            retry_count: row.retry_count,
        })
    }
}
