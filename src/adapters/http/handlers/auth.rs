//! Authentication endpoints.

use axum::extract::{Query, State};
use axum::response::{Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::adapters::http::extract::AuthActor;
use crate::adapters::http::responses::{created, ok, ApiResult};
use crate::adapters::http::AppState;
use crate::domain::models::{AuthTokens, User};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (user, tokens) = state
        .auth
        .authenticate_password(&body.email, &body.password)
        .await?;
    Ok(ok(SessionResponse { user, tokens }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Response> {
    let (user, tokens) = state
        .auth
        .register(&body.email, &body.name, &body.password)
        .await?;
    Ok(created(SessionResponse { user, tokens }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Response> {
    let (user, tokens) = state.auth.refresh(&body.refresh_token).await?;
    Ok(ok(SessionResponse { user, tokens }))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Response> {
    state.auth.logout(&body.refresh_token).await?;
    Ok(ok(serde_json::json!({ "logged_out": true })))
}

pub async fn me(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
) -> ApiResult<Response> {
    let user = state.users.get(&actor, actor.user_id).await?;
    Ok(ok(user))
}

/// Kick off the federated login flow: redirect to the IdP with a fresh
/// CSRF state.
pub async fn keycloak_authorize(State(state): State<AppState>) -> ApiResult<Redirect> {
    let csrf = state.oauth_states.issue(None);
    let url = state.auth.federated_authorize_url(&csrf)?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub async fn keycloak_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Response> {
    if state.oauth_states.consume(&query.state).is_none() {
        return Err(crate::domain::errors::DomainError::ValidationFailed(
            "invalid or expired state".into(),
        )
        .into());
    }
    let (user, tokens) = state.auth.federate(&query.code).await?;
    Ok(ok(SessionResponse { user, tokens }))
}
