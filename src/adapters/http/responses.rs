//! Response envelope shared by every endpoint.
//!
//! Success: `{ "success": true, "data": ..., "metadata": {...}?, "message": ...? }`
//! Error:   `{ "success": false, "error": { "code", "message", "details"? } }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::errors::{DomainError, FieldError};

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 200 with data.
pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            data,
            metadata: None,
            message: None,
        }),
    )
        .into_response()
}

/// 200 with data and pagination metadata.
pub fn ok_paged<T: Serialize>(data: T, meta: PageMeta) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            data,
            metadata: Some(meta),
            message: None,
        }),
    )
        .into_response()
}

/// 201 for resource creation.
pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            data,
            metadata: None,
            message: None,
        }),
    )
        .into_response()
}

/// 204 for deletes.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Error envelope carried by [`ApiError`].
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Wrapper turning a [`DomainError`] into an HTTP response. Internal
/// errors are logged server-side and stripped from the body.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = match code {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" | "REAUTH_REQUIRED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT_EXCEEDED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed with internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        let details = self.0.details().map(<[FieldError]>::to_vec);

        (
            status,
            Json(ErrorBody {
                success: false,
                error: ErrorDetail {
                    code,
                    message,
                    details,
                },
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn status_mapping_matches_taxonomy() {
        let cases = [
            (DomainError::ValidationFailed("x".into()), 400),
            (DomainError::Unauthorized, 401),
            (DomainError::ReauthRequired, 401),
            (DomainError::Forbidden, 403),
            (DomainError::TaskNotFound(Uuid::nil()), 404),
            (DomainError::Conflict("x".into()), 409),
            (DomainError::RateLimited("x".into()), 429),
            (DomainError::DatabaseError("x".into()), 500),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
    }
}
