//! Recurrence monitoring.
//!
//! The materializer runs inside the database on the scheduler's clock;
//! this service is the thin application-side window onto its run
//! history.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Actor, RecurrenceLogEntry, Role};
use crate::domain::ports::RecurrenceLogRepository;

pub struct RecurrenceService {
    logs: Arc<dyn RecurrenceLogRepository>,
}

impl RecurrenceService {
    pub fn new(logs: Arc<dyn RecurrenceLogRepository>) -> Self {
        Self { logs }
    }

    /// Recent materializer runs. Admin only.
    pub async fn recent_runs(
        &self,
        actor: &Actor,
        limit: i64,
    ) -> DomainResult<Vec<RecurrenceLogEntry>> {
        if actor.role != Role::Admin {
            return Err(DomainError::Forbidden);
        }
        self.logs.list_recent(limit.clamp(1, 500)).await
    }

    /// Run history for one template. Admin only.
    pub async fn template_history(
        &self,
        actor: &Actor,
        parent_task_id: Uuid,
        limit: i64,
    ) -> DomainResult<Vec<RecurrenceLogEntry>> {
        if actor.role != Role::Admin {
            return Err(DomainError::Forbidden);
        }
        self.logs
            .list_for_template(parent_task_id, limit.clamp(1, 500))
            .await
    }
}
