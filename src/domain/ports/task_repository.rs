//! Task repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    SortOrder, Task, TaskPriority, TaskScope, TaskSortKey, TaskStatus,
};

/// Filter criteria for listing tasks. All fields AND together; the
/// scope predicate is applied on top.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub is_recurring: Option<bool>,
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    /// Free-text query against the generated search vector.
    pub search: Option<String>,
}

/// Pagination and ordering for task listings.
#[derive(Debug, Clone)]
pub struct TaskPage {
    /// 1-based page number.
    pub page: u32,
    /// Clamped to 1..=100.
    pub per_page: u32,
    pub sort: TaskSortKey,
    pub order: SortOrder,
}

impl Default for TaskPage {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            sort: TaskSortKey::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl TaskPage {
    /// Normalize user input to the allowed ranges.
    pub fn clamped(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = self.per_page.clamp(1, 100);
        self
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// Repository interface for Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a task and its initial assignee set in one transaction.
    /// Assigns the external id from the sequence and returns the stored
    /// row with assignees loaded.
    async fn create(&self, task: &Task, assignee_ids: &[Uuid]) -> DomainResult<Task>;

    /// Get a task by ID with assignees loaded. Scope checks are the
    /// caller's responsibility.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Get a task by its short external id (`task-NNNNNN`).
    async fn get_by_external_id(&self, external_id: &str) -> DomainResult<Option<Task>>;

    /// Update an existing task's mutable columns.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// Replace the assignee set in a single transaction: delete the
    /// existing junction rows, insert the new ones.
    async fn replace_assignees(&self, task_id: Uuid, assignee_ids: &[Uuid]) -> DomainResult<()>;

    /// Delete a task. Comments, attachments, assignments, and
    /// materialized occurrences go with it by FK cascade.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List tasks matching `filter` within `scope`, with assignees
    /// loaded in a single batch. Returns (rows, total count).
    async fn list(
        &self,
        filter: &TaskFilter,
        scope: &TaskScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Task>, u64)>;

    /// Count tasks referencing a project (referential-integrity refusals).
    async fn count_by_project(&self, project_id: Uuid) -> DomainResult<u64>;

    /// Count tasks referencing a department.
    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_to_allowed_ranges() {
        let page = TaskPage {
            page: 0,
            per_page: 500,
            ..Default::default()
        }
        .clamped();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);

        let page = TaskPage {
            page: 3,
            per_page: 0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(page.per_page, 1);
        assert_eq!(page.offset(), 2);
    }

    #[test]
    fn default_page_matches_contract() {
        let page = TaskPage::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 20);
        assert_eq!(page.sort, TaskSortKey::CreatedAt);
        assert_eq!(page.order, SortOrder::Desc);
    }
}
