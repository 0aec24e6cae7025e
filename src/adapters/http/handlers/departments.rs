//! Department endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{created, no_content, ok, ok_paged, ApiResult, PageMeta};
use crate::adapters::http::AppState;
use crate::services::department_service::DepartmentInput;

use super::tasks::{build_list_input, ListTasksQuery};
use super::users::PageQuery;

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub head_id: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl From<DepartmentRequest> for DepartmentInput {
    fn from(body: DepartmentRequest) -> Self {
        DepartmentInput {
            name: body.name,
            description: body.description,
            head_id: body.head_id,
            parent_id: body.parent_id,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Response> {
    let departments = state.departments.list(&actor).await?;
    Ok(ok(departments))
}

pub async fn create(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(body): Json<DepartmentRequest>,
) -> ApiResult<Response> {
    let department = state.departments.create(&actor, body.into()).await?;
    Ok(created(department))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let department = state.departments.get(&actor, id).await?;
    Ok(ok(department))
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<DepartmentRequest>,
) -> ApiResult<Response> {
    let department = state.departments.update(&actor, id, body.into()).await?;
    Ok(ok(department))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    state.departments.delete(&actor, id).await?;
    Ok(no_content())
}

/// Users belonging to this department.
pub async fn users(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    // Existence check doubles as the admin gate.
    state.departments.get(&actor, id).await?;
    let page = query.to_page().clamped();
    let (users, total) = state.users.list_in_department(&actor, id, page.clone()).await?;
    Ok(ok_paged(
        users,
        PageMeta {
            page: page.page,
            per_page: page.per_page,
            total,
        },
    ))
}

/// Tasks belonging to this department, through the normal task scope.
pub async fn tasks(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Response> {
    state.departments.get(&actor, id).await?;
    let mut input = build_list_input(query)?;
    input.filter.department_id = Some(id);
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
