//! Mail integration endpoints.
//!
//! The provider segment accepts the URL forms `zoho-mail` and
//! `outlook`.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{ok, ApiResult};
use crate::adapters::http::AppState;
use crate::domain::errors::DomainError;
use crate::domain::models::MailProvider;

fn parse_provider(raw: &str) -> Result<MailProvider, DomainError> {
    MailProvider::from_str(raw)
        .ok_or_else(|| DomainError::NotFound(format!("unknown mail provider '{raw}'")))
}

/// Start the OAuth flow; returns the provider authorization URL.
pub async fn auth(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    let url = state.mail_oauth.initiate(&actor, provider)?;
    Ok(ok(serde_json::json!({ "authorization_url": url })))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub state: String,
}

/// Provider redirect target. The state parameter identifies the user
/// who initiated the flow, so no bearer token is required here.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    let integration = state
        .mail_oauth
        .callback(provider, &query.code, &query.state)
        .await?;
    Ok(ok(integration))
}

pub async fn status(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    let integration = state.mail_oauth.status(&actor, provider).await?;
    Ok(ok(integration))
}

/// Run one sync pass now, outside the poller cadence.
pub async fn sync(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    let integration_id = state.mail_oauth.integration_id(&actor, provider).await?;
    let summary = state.mail_sync.sync_integration(integration_id).await?;
    Ok(ok(summary))
}

pub async fn disconnect(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    state.mail_oauth.disconnect(&actor, provider).await?;
    Ok(ok(serde_json::json!({ "disconnected": true })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn logs(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(provider): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Response> {
    let provider = parse_provider(&provider)?;
    let logs = state
        .mail_oauth
        .logs(&actor, provider, query.limit.unwrap_or(50))
        .await?;
    Ok(ok(logs))
}
