//! User endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{no_content, ok, ok_paged, ApiResult, PageMeta};
use crate::adapters::http::AppState;
use crate::domain::ports::TaskPage;
use crate::services::user_service::UpdateUserInput;

use super::tasks::{build_list_input, ListTasksQuery};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn to_page(&self) -> TaskPage {
        TaskPage {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(20),
            ..Default::default()
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<PageQuery>,
) -> ApiResult<Response> {
    let page = query.to_page().clamped();
    let (users, total) = state.users.list(&actor, page.clone()).await?;
    Ok(ok_paged(
        users,
        PageMeta {
            page: page.page,
            per_page: page.per_page,
            total,
        },
    ))
}

pub async fn get(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let user = state.users.get(&actor, id).await?;
    Ok(ok(user))
}

/// Deserialize a nullable patch field: absent stays `None`, explicit
/// `null` becomes `Some(None)`, a value becomes `Some(Some(v))`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Wire shape for user patches. Double-optioned fields distinguish
/// "absent" from "set to null".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub job_title: Option<Option<String>>,
    #[serde(default)]
    pub preferences: Option<serde_json::Value>,
    #[serde(default)]
    pub notification_settings: Option<serde_json::Value>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Response> {
    let patch = UpdateUserInput {
        name: body.name,
        avatar_url: body.avatar_url,
        job_title: body.job_title,
        preferences: body.preferences,
        notification_settings: body.notification_settings,
        role: body.role,
        department_id: body.department_id,
        is_active: body.is_active,
    };
    let user = state.users.update(&actor, id, patch).await?;
    Ok(ok(user))
}

pub async fn deactivate(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    state.users.deactivate(&actor, id).await?;
    Ok(no_content())
}

/// Tasks assigned to the user, through the normal task scope.
pub async fn tasks(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Response> {
    let mut input = build_list_input(query)?;
    input.filter.assignee_id = Some(id);
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
