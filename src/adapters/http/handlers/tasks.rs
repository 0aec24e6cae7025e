//! Task endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{created, no_content, ok, ok_paged, ApiResult, PageMeta};
use crate::adapters::http::AppState;
use crate::domain::errors::{DomainError, FieldError};
use crate::domain::models::{
    RecurrencePattern, SortOrder, TaskPriority, TaskSortKey, TaskStatus,
};
use crate::domain::ports::{TaskFilter, TaskPage};
use crate::services::task_service::{CreateTaskInput, ListTasksInput, UpdateTaskInput};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub skip_dates: Vec<NaiveDate>,
}

impl From<CreateTaskRequest> for CreateTaskInput {
    fn from(body: CreateTaskRequest) -> Self {
        CreateTaskInput {
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            source: body.source,
            department_id: body.department_id,
            project_id: body.project_id,
            due_date: body.due_date,
            tags: body.tags,
            assignee_ids: body.assignee_ids,
            confidence_score: body.confidence_score,
            metadata: body.metadata,
            is_recurring: body.is_recurring,
            recurrence_pattern: body.recurrence_pattern,
            skip_dates: body.skip_dates,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub assignee_ids: Option<Vec<Uuid>>,
}

impl From<UpdateTaskRequest> for UpdateTaskInput {
    fn from(body: UpdateTaskRequest) -> Self {
        UpdateTaskInput {
            title: body.title,
            description: body.description,
            status: body.status,
            priority: body.priority,
            department_id: body.department_id,
            project_id: body.project_id,
            due_date: body.due_date,
            tags: body.tags,
            assignee_ids: body.assignee_ids,
        }
    }
}

/// Listing query. Comma-separated enum sets, RFC-3339 date bounds.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub creator_id: Option<Uuid>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
    #[serde(default)]
    pub due_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

pub(crate) fn build_list_input(query: ListTasksQuery) -> Result<ListTasksInput, DomainError> {
    let mut errors = Vec::new();

    let mut statuses = Vec::new();
    if let Some(ref raw) = query.status {
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match TaskStatus::from_str(part) {
                Some(status) => statuses.push(status),
                None => errors.push(FieldError::new("status", format!("unknown value '{part}'"))),
            }
        }
    }
    let mut priorities = Vec::new();
    if let Some(ref raw) = query.priority {
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match TaskPriority::from_str(part) {
                Some(priority) => priorities.push(priority),
                None => {
                    errors.push(FieldError::new("priority", format!("unknown value '{part}'")))
                }
            }
        }
    }

    let sort = match query.sort.as_deref() {
        None => TaskSortKey::default(),
        Some(raw) => match TaskSortKey::from_str(raw) {
            Some(sort) => sort,
            None => {
                errors.push(FieldError::new("sort", format!("unknown value '{raw}'")));
                TaskSortKey::default()
            }
        },
    };
    let order = match query.order.as_deref() {
        None => SortOrder::default(),
        Some(raw) => match SortOrder::from_str(raw) {
            Some(order) => order,
            None => {
                errors.push(FieldError::new("order", format!("unknown value '{raw}'")));
                SortOrder::default()
            }
        },
    };

    if !errors.is_empty() {
        return Err(DomainError::ValidationDetails(errors));
    }

    Ok(ListTasksInput {
        filter: TaskFilter {
            statuses,
            priorities,
            assignee_id: query.assignee_id,
            creator_id: query.creator_id,
            department_id: query.department_id,
            project_id: query.project_id,
            is_recurring: query.is_recurring,
            due_after: query.due_after,
            due_before: query.due_before,
            search: query.search,
        },
        page: TaskPage {
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(20),
            sort,
            order,
        },
    })
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Response> {
    let input = build_list_input(query)?;
    let page = input.page.clone().clamped();
    let (tasks, total) = state.tasks.list(&actor, input).await?;
    Ok(ok_paged(
        tasks,
        PageMeta {
            page: page.page,
            per_page: page.per_page,
            total,
        },
    ))
}

pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<CreateTaskRequest>,
) -> ApiResult<Response> {
    let task = state.tasks.create(&actor, body.into()).await?;
    Ok(created(task))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let task = state.tasks.get(&actor, id).await?;
    Ok(ok(task))
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTaskRequest>,
) -> ApiResult<Response> {
    let task = state.tasks.update(&actor, id, body.into()).await?;
    Ok(ok(task))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> ApiResult<Response> {
    let task = state.tasks.update_status(&actor, id, &body.status).await?;
    Ok(ok(task))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    state.tasks.delete(&actor, id).await?;
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let comments = state.comments.list(&actor, id).await?;
    Ok(ok(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateCommentRequest>,
) -> ApiResult<Response> {
    let comment = state.comments.create(&actor, id, &body.content).await?;
    Ok(created(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path((_task_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    state.comments.delete(&actor, comment_id).await?;
    Ok(no_content())
}

pub async fn list_attachments(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let attachments = state.comments.list_attachments(&actor, id).await?;
    Ok(ok(attachments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_status_sets_parse() {
        let query = ListTasksQuery {
            status: Some("todo, in_progress".into()),
            ..Default::default()
        };
        let input = build_list_input(query).unwrap();
        assert_eq!(
            input.filter.statuses,
            vec![TaskStatus::Todo, TaskStatus::InProgress]
        );
    }

    #[test]
    fn unknown_sort_is_rejected_not_passed_through() {
        let query = ListTasksQuery {
            sort: Some("password_hash".into()),
            ..Default::default()
        };
        assert!(build_list_input(query).is_err());
    }

    #[test]
    fn unknown_status_in_filter_is_a_validation_error() {
        let query = ListTasksQuery {
            status: Some("todo,bogus".into()),
            ..Default::default()
        };
        let err = build_list_input(query).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
