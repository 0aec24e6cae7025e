//! Request extractors.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::errors::DomainError;
use crate::domain::models::Actor;

use super::responses::ApiError;
use super::AppState;

/// Extracts and verifies the bearer token, yielding the typed [`Actor`]
/// every service call takes.
pub struct AuthActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError(DomainError::Unauthorized))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(ApiError(DomainError::Unauthorized))?;

        let actor = state.auth.verify(token).map_err(ApiError)?;
        Ok(AuthActor(actor))
    }
}
