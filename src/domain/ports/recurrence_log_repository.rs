//! Recurrence audit log port.
//!
//! The materializer itself runs inside the database; the application
//! only reads its run history for the monitoring surface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::RecurrenceLogEntry;

#[async_trait]
pub trait RecurrenceLogRepository: Send + Sync {
    /// Most recent materializer runs across all templates.
    async fn list_recent(&self, limit: i64) -> DomainResult<Vec<RecurrenceLogEntry>>;

    /// Run history for one template, newest first.
    async fn list_for_template(
        &self,
        parent_task_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<RecurrenceLogEntry>>;
}
