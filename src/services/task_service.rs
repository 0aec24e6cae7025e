//! Task engine: CRUD, status transitions, filtered listing.
//!
//! Every operation takes the typed [`Actor`] produced by token
//! verification; the authorization filter supplies the scope predicate
//! and the mutation gates.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{
    Actor, RecurrencePattern, Task, TaskPriority, TaskSource, TaskStatus,
};
use crate::domain::ports::{
    DepartmentRepository, ProjectRepository, TaskFilter, TaskPage, TaskRepository, UserRepository,
};
use crate::services::authorization::{
    can_delete_task, can_update_task, permissions, require_permission, task_scope,
};

/// Input for task creation. Enum-valued fields arrive as wire strings
/// so out-of-enum values surface as `VALIDATION_ERROR`, not parse
/// failures.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub source: Option<String>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub assignee_ids: Vec<Uuid>,
    pub confidence_score: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub skip_dates: Vec<NaiveDate>,
}

/// Patch for task update. `None` leaves a field untouched. The due
/// date is the raw wire string: empty clears, otherwise RFC-3339.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub assignee_ids: Option<Vec<Uuid>>,
}

/// Listing parameters as assembled by the handler.
#[derive(Debug, Clone, Default)]
pub struct ListTasksInput {
    pub filter: TaskFilter,
    pub page: TaskPage,
}

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserRepository>,
    projects: Arc<dyn ProjectRepository>,
    departments: Arc<dyn DepartmentRepository>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserRepository>,
        projects: Arc<dyn ProjectRepository>,
        departments: Arc<dyn DepartmentRepository>,
    ) -> Self {
        Self {
            tasks,
            users,
            projects,
            departments,
        }
    }

    /// Create a task (or a recurring template) as `actor`.
    pub async fn create(&self, actor: &Actor, input: CreateTaskInput) -> DomainResult<Task> {
        require_permission(actor, permissions::TASKS_CREATE)?;

        let title = input.title.trim().to_string();
        let mut errors = Vec::new();
        if title.is_empty() || title.len() > 255 {
            errors.push(FieldError::new("title", "must be 1..255 characters"));
        }

        let status = parse_enum(&input.status, TaskStatus::from_str, "status", &mut errors)
            .unwrap_or_default();
        let priority = parse_enum(&input.priority, TaskPriority::from_str, "priority", &mut errors)
            .unwrap_or_default();
        let source = parse_enum(&input.source, TaskSource::from_str, "source", &mut errors)
            .unwrap_or_default();

        if let Some(score) = input.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                errors.push(FieldError::new("confidence_score", "must be in [0, 1]"));
            }
        }
        if input.is_recurring && input.recurrence_pattern.is_none() {
            errors.push(FieldError::new(
                "recurrence_pattern",
                "required when is_recurring is true",
            ));
        }
        if let Some(ref pattern) = input.recurrence_pattern {
            if let Err(DomainError::ValidationDetails(mut pattern_errors)) = pattern.validate() {
                errors.append(&mut pattern_errors);
            }
        }
        if !errors.is_empty() {
            return Err(DomainError::ValidationDetails(errors));
        }

        // Department defaults to the actor's.
        let department_id = input.department_id.or(actor.department_id);
        if let Some(dept) = department_id {
            self.departments
                .get(dept)
                .await?
                .ok_or(DomainError::DepartmentNotFound(dept))?;
        }
        if let Some(project) = input.project_id {
            self.projects
                .get(project)
                .await?
                .ok_or(DomainError::ProjectNotFound(project))?;
        }
        self.ensure_users_exist(&input.assignee_ids).await?;

        let mut task = Task::new(title, actor.user_id);
        task.description = input.description.unwrap_or_default();
        task.status = status;
        task.priority = priority;
        task.source = source;
        task.department_id = department_id;
        task.project_id = input.project_id;
        task.due_date = input.due_date;
        task.tags = input.tags;
        task.confidence_score = input.confidence_score;
        if let Some(metadata) = input.metadata {
            task.metadata = metadata;
        }
        if status == TaskStatus::Done {
            task.completion_date = Some(Utc::now());
        }

        if let (true, Some(pattern)) = (input.is_recurring, input.recurrence_pattern) {
            task.is_recurring = true;
            task.skip_dates = input.skip_dates;
            task.recurrence_count = pattern.count.map(|c| c as i32);
            task.recurrence_end_date = pattern.until;
            // The first occurrence fires at the due date when one is
            // given, otherwise at the first pattern hit after now.
            task.next_occurrence = match task.due_date {
                Some(due) => Some(due),
                None => pattern.next_occurrence(Utc::now(), &task.skip_dates),
            };
            task.recurrence_pattern = Some(pattern);
        }

        self.tasks.create(&task, &input.assignee_ids).await
    }

    /// List tasks visible to `actor`, scope unioned into the filter.
    pub async fn list(
        &self,
        actor: &Actor,
        input: ListTasksInput,
    ) -> DomainResult<(Vec<Task>, u64)> {
        require_permission(actor, permissions::TASKS_READ)?;
        let scope = task_scope(actor);
        let page = input.page.clamped();
        self.tasks.list(&input.filter, &scope, &page).await
    }

    /// Get one task with relations eagerly loaded.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> DomainResult<Task> {
        require_permission(actor, permissions::TASKS_READ)?;
        let task = self
            .tasks
            .get(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))?;
        if !task_scope(actor).allows(&task) {
            return Err(DomainError::Forbidden);
        }
        Ok(task)
    }

    /// Apply a patch. The completion-date side effect and the assignee
    /// replacement follow the update contract.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: UpdateTaskInput,
    ) -> DomainResult<Task> {
        let mut task = self
            .tasks
            .get(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))?;
        if !can_update_task(actor, &task) {
            return Err(DomainError::Forbidden);
        }

        let mut errors = Vec::new();
        if let Some(ref title) = patch.title {
            let trimmed = title.trim();
            if trimmed.is_empty() || trimmed.len() > 255 {
                errors.push(FieldError::new("title", "must be 1..255 characters"));
            } else {
                task.title = trimmed.to_string();
            }
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(status) =
            parse_enum(&patch.status, TaskStatus::from_str, "status", &mut errors)
        {
            apply_status_transition(&mut task, status, Utc::now());
        }
        if let Some(priority) =
            parse_enum(&patch.priority, TaskPriority::from_str, "priority", &mut errors)
        {
            task.priority = priority;
        }
        match parse_due_date(&patch.due_date) {
            Ok(Some(due)) => task.due_date = due,
            Ok(None) => {}
            Err(field_error) => errors.push(field_error),
        }
        if !errors.is_empty() {
            return Err(DomainError::ValidationDetails(errors));
        }

        if let Some(dept) = patch.department_id {
            self.departments
                .get(dept)
                .await?
                .ok_or(DomainError::DepartmentNotFound(dept))?;
            task.department_id = Some(dept);
        }
        if let Some(project) = patch.project_id {
            self.projects
                .get(project)
                .await?
                .ok_or(DomainError::ProjectNotFound(project))?;
            task.project_id = Some(project);
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }

        task.updated_at = Utc::now();
        self.tasks.update(&task).await?;

        if let Some(assignee_ids) = patch.assignee_ids {
            self.ensure_users_exist(&assignee_ids).await?;
            self.tasks.replace_assignees(id, &assignee_ids).await?;
        }

        self.tasks
            .get(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))
    }

    /// Fast path for board drags: status only, same transition rules.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        new_status: &str,
    ) -> DomainResult<Task> {
        let mut task = self
            .tasks
            .get(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))?;
        if !can_update_task(actor, &task) {
            return Err(DomainError::Forbidden);
        }
        let status = TaskStatus::from_str(new_status).ok_or_else(|| {
            DomainError::ValidationDetails(vec![FieldError::new(
                "status",
                format!("unknown value '{new_status}'"),
            )])
        })?;
        apply_status_transition(&mut task, status, Utc::now());
        task.updated_at = Utc::now();
        self.tasks.update(&task).await?;
        Ok(task)
    }

    /// Delete a task; comments, attachments, assignments, and
    /// materialized occurrences cascade.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        let task = self
            .tasks
            .get(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))?;
        if !can_delete_task(actor, &task) {
            return Err(DomainError::Forbidden);
        }
        self.tasks.delete(id).await
    }

    async fn ensure_users_exist(&self, user_ids: &[Uuid]) -> DomainResult<()> {
        for user_id in user_ids {
            self.users
                .get(*user_id)
                .await?
                .ok_or(DomainError::UserNotFound(*user_id))?;
        }
        Ok(())
    }
}

/// Status change with the completion-date side effect: entering Done
/// stamps `completion_date` iff unset; leaving Done clears it.
fn apply_status_transition(task: &mut Task, new_status: TaskStatus, now: DateTime<Utc>) {
    if new_status == TaskStatus::Done {
        if task.completion_date.is_none() {
            task.completion_date = Some(now);
        }
    } else {
        task.completion_date = None;
    }
    task.status = new_status;
}

/// Parse an optional wire enum, pushing a field error on failure.
fn parse_enum<T>(
    raw: &Option<String>,
    parse: fn(&str) -> Option<T>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match raw {
        None => None,
        Some(s) => match parse(s) {
            Some(value) => Some(value),
            None => {
                errors.push(FieldError::new(field, format!("unknown value '{s}'")));
                None
            }
        },
    }
}

/// Due-date patch semantics: absent = keep, empty = clear, otherwise
/// RFC-3339. The outer Option distinguishes "no change".
#[allow(clippy::type_complexity)]
fn parse_due_date(
    raw: &Option<String>,
) -> Result<Option<Option<DateTime<Utc>>>, FieldError> {
    match raw.as_deref() {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(Some(dt.with_timezone(&Utc))))
            .map_err(|_| FieldError::new("due_date", "must be RFC-3339 or empty to clear")),
    }
}
