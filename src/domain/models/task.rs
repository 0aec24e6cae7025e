//! Task domain model.
//!
//! Tasks are the unit of work everything else converges on: direct API
//! writes, mail ingestion, and recurring-template materialization all
//! produce rows of this shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recurrence::RecurrencePattern;

/// Status of a task on the board.
///
/// The transition graph is free (any status to any status); only
/// transitions touching [`TaskStatus::Done`] carry the completion-date
/// side effect, which the service layer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    InReview,
    Blocked,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "todo" | "to_do" | "to-do" => Some(Self::Todo),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "in_review" | "in-review" => Some(Self::InReview),
            "blocked" => Some(Self::Blocked),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Statuses counted as "active" in the default board view.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

/// Priority of a task, orthogonal to status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" | "critical" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Where a task originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    /// Created interactively through the UI.
    Gui,
    /// Extracted from an incoming mail message.
    Email,
    /// Created through the public API.
    Api,
    /// Imported from a document.
    Document,
    /// Materialized from a recurring template.
    Recurring,
}

impl Default for TaskSource {
    fn default() -> Self {
        Self::Gui
    }
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gui => "gui",
            Self::Email => "email",
            Self::Api => "api",
            Self::Document => "document",
            Self::Recurring => "recurring",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gui" => Some(Self::Gui),
            "email" => Some(Self::Email),
            "api" => Some(Self::Api),
            "document" => Some(Self::Document),
            "recurring" => Some(Self::Recurring),
            _ => None,
        }
    }
}

/// An entry in the task-assignee junction, joined with the user's
/// display fields for single-batch eager loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignee {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub assigned_at: DateTime<Utc>,
}

/// A task, including the inlined recurrence-template fields.
///
/// A row with `is_recurring = true` is a template: it is never worked,
/// it only generates occurrence rows (which point back to it via
/// `recurrence_parent_id` and have `is_recurring = false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Short external id, `task-NNNNNN`, from a monotonic sequence.
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub source: TaskSource,
    /// Immutable after creation.
    pub creator_id: Uuid,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    /// Set exactly while `status == Done`.
    pub completion_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    /// Extraction confidence for mail-sourced tasks, in [0, 1].
    pub confidence_score: Option<f64>,
    pub metadata: serde_json::Value,

    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    /// Next instant the materializer should fire for this template.
    pub next_occurrence: Option<DateTime<Utc>>,
    /// Calendar dates the materializer must never land on.
    pub skip_dates: Vec<NaiveDate>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    /// Cap on the number of occurrences, when set.
    pub recurrence_count: Option<i32>,
    /// Occurrences generated so far.
    pub generated_count: i32,
    /// Template this occurrence was materialized from.
    pub recurrence_parent_id: Option<Uuid>,

    /// Loaded in a single batch by task id; never persisted inline.
    #[serde(default)]
    pub assignees: Vec<TaskAssignee>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with defaults. The external id is a placeholder
    /// until the repository assigns one from the sequence.
    pub fn new(title: impl Into<String>, creator_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: String::new(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            source: TaskSource::Gui,
            creator_id,
            department_id: None,
            project_id: None,
            due_date: None,
            completion_date: None,
            tags: Vec::new(),
            confidence_score: None,
            metadata: serde_json::Value::Object(Default::default()),
            is_recurring: false,
            recurrence_pattern: None,
            next_occurrence: None,
            skip_dates: Vec::new(),
            recurrence_end_date: None,
            recurrence_count: None,
            generated_count: 0,
            recurrence_parent_id: None,
            assignees: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` appears in the loaded assignee set.
    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.assignees.iter().any(|a| a.user_id == user_id)
    }
}

/// Columns the list operation may sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortKey {
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Status,
    Title,
}

impl Default for TaskSortKey {
    fn default() -> Self {
        Self::CreatedAt
    }
}

impl TaskSortKey {
    /// Parse a user-supplied sort key. Anything outside the whitelist
    /// is rejected so it can never reach the SQL layer.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "due_date" => Some(Self::DueDate),
            "priority" => Some(Self::Priority),
            "status" => Some(Self::Status),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::DueDate => "due_date",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::Title => "title",
        }
    }
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

impl SortOrder {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_and_accepts_aliases() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::InReview,
            TaskStatus::Blocked,
            TaskStatus::Done,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("to-do"), Some(TaskStatus::Todo));
        assert_eq!(TaskStatus::from_str("cancelled"), None);
    }

    #[test]
    fn priority_ordering_matches_urgency() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn sort_key_rejects_unknown_columns() {
        assert_eq!(TaskSortKey::from_str("created_at"), Some(TaskSortKey::CreatedAt));
        assert_eq!(TaskSortKey::from_str("creator_id"), None);
        assert_eq!(TaskSortKey::from_str("; DROP TABLE tasks"), None);
    }

    #[test]
    fn new_task_has_spec_defaults() {
        let task = Task::new("Write report", Uuid::new_v4());
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.source, TaskSource::Gui);
        assert!(task.completion_date.is_none());
        assert!(!task.is_recurring);
    }
}
