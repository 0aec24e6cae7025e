//! Project endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{created, no_content, ok, ok_paged, ApiResult, PageMeta};
use crate::adapters::http::AppState;
use crate::domain::errors::{DomainError, FieldError};
use crate::domain::models::ProjectStatus;
use crate::domain::ports::ProjectFilter;
use crate::services::project_service::ProjectInput;

use super::tasks::{build_list_input, ListTasksQuery};
use super::users::PageQuery;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl From<ProjectRequest> for ProjectInput {
    fn from(body: ProjectRequest) -> Self {
        ProjectInput {
            name: body.name,
            description: body.description,
            status: body.status,
            department_id: body.department_id,
            owner_id: body.owner_id,
            start_date: body.start_date,
            end_date: body.end_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Response> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(ProjectStatus::from_str(raw).ok_or_else(|| {
            DomainError::ValidationDetails(vec![FieldError::new(
                "status",
                format!("unknown value '{raw}'"),
            )])
        })?),
    };
    let filter = ProjectFilter {
        status,
        department_id: query.department_id,
        owner_id: query.owner_id,
    };
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .to_page()
    .clamped();
    let (projects, total) = state.projects.list(&actor, filter, page.clone()).await?;
    Ok(ok_paged(
        projects,
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
    Json(body): Json<ProjectRequest>,
) -> ApiResult<Response> {
    let project = state.projects.create(&actor, body.into()).await?;
    Ok(created(project))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let project = state.projects.get(&actor, id).await?;
    Ok(ok(project))
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<ProjectRequest>,
) -> ApiResult<Response> {
    let project = state.projects.update(&actor, id, body.into()).await?;
    Ok(ok(project))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    state.projects.delete(&actor, id).await?;
    Ok(no_content())
}

/// Tasks in this project, through the normal task scope.
pub async fn tasks(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Response> {
    let mut input = build_list_input(query)?;
    input.filter.project_id = Some(id);
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
