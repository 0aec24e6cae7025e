//! Mail integration repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{MailIntegration, MailProcessingLog, MailProvider, Task};

/// Result of the atomic create-task-with-log operation.
#[derive(Debug)]
pub enum MailIngestOutcome {
    /// The task and its log row were inserted.
    Created(Task),
    /// Another pass already logged this (integration, message id);
    /// nothing was inserted.
    Duplicate,
}

/// Repository interface for mail integrations and their processing log.
#[async_trait]
pub trait MailIntegrationRepository: Send + Sync {
    /// Insert or replace the row for (user, provider). Replacement
    /// rotates the encrypted token columns.
    async fn upsert(&self, integration: &MailIntegration) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<MailIntegration>>;

    async fn get_for_user(
        &self,
        user_id: Uuid,
        provider: MailProvider,
    ) -> DomainResult<Option<MailIntegration>>;

    async fn update(&self, integration: &MailIntegration) -> DomainResult<()>;

    /// Integrations eligible for a poller pass: sync enabled and
    /// status connected, oldest `last_sync_at` first.
    async fn list_syncable(&self) -> DomainResult<Vec<MailIntegration>>;

    /// Whether a log row exists for (integration, provider message id).
    async fn is_processed(&self, integration_id: Uuid, message_id: &str) -> DomainResult<bool>;

    /// Append a log row for a message that produced no task. Returns
    /// false when the unique constraint reports the message as already
    /// logged by a concurrent pass.
    async fn record_log(&self, log: &MailProcessingLog) -> DomainResult<bool>;

    /// Insert the extracted task, its assignee row, and the processing
    /// log in ONE transaction. A unique-constraint conflict on the log
    /// rolls the task back and reports [`MailIngestOutcome::Duplicate`].
    async fn create_task_with_log(
        &self,
        task: &Task,
        assignee_ids: &[Uuid],
        log: &MailProcessingLog,
    ) -> DomainResult<MailIngestOutcome>;

    /// Recent processing history for an integration, newest first.
    async fn list_logs(
        &self,
        integration_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<MailProcessingLog>>;
}
