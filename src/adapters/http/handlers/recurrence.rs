//! Recurrence monitoring endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{ok, ApiResult};
use crate::adapters::http::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Recent materializer runs across all templates.
pub async fn runs(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Response> {
    let runs = state
        .recurrence
        .recent_runs(&actor, query.limit.unwrap_or(100))
        .await?;
    Ok(ok(runs))
}

/// Run history for one template.
pub async fn template_runs(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    Query(query): Query<RunsQuery>,
) -> ApiResult<Response> {
    let runs = state
        .recurrence
        .template_history(&actor, id, query.limit.unwrap_or(100))
        .await?;
    Ok(ok(runs))
}
