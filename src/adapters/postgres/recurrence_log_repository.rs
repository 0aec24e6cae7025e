//! Postgres read adapter for the materializer audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RecurrenceLogEntry, RecurrenceRunStatus};
use crate::domain::ports::RecurrenceLogRepository;

#[derive(Clone)]
pub struct PgRecurrenceLogRepository {
    pool: PgPool,
}

impl PgRecurrenceLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecurrenceLogRepository for PgRecurrenceLogRepository {
    async fn list_recent(&self, limit: i64) -> DomainResult<Vec<RecurrenceLogEntry>> {
        let rows: Vec<RecurrenceLogRow> = sqlx::query_as(
            "SELECT * FROM recurring_task_log ORDER BY generated_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_template(
        &self,
        parent_task_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<RecurrenceLogEntry>> {
        let rows: Vec<RecurrenceLogRow> = sqlx::query_as(
            r#"SELECT * FROM recurring_task_log
               WHERE parent_task_id = $1
               ORDER BY generated_at DESC
               LIMIT $2"#,
        )
        .bind(parent_task_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct RecurrenceLogRow {
    id: Uuid,
    parent_task_id: Uuid,
    generated_task_id: Option<Uuid>,
    scheduled_for: Option<DateTime<Utc>>,
    generated_at: DateTime<Utc>,
    status: String,
    error_message: Option<String>,
}

impl TryFrom<RecurrenceLogRow> for RecurrenceLogEntry {
    type Error = DomainError;

    fn try_from(row: RecurrenceLogRow) -> Result<Self, Self::Error> {
        Ok(RecurrenceLogEntry {
            id: row.id,
            parent_task_id: row.parent_task_id,
            generated_task_id: row.generated_task_id,
            scheduled_for: row.scheduled_for,
            generated_at: row.generated_at,
            status: RecurrenceRunStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::SerializationError(format!("unknown run status '{}'", row.status))
            })?,
            error_message: row.error_message,
        })
    }
}
