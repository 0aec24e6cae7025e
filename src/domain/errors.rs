//! Domain errors for the taskdesk service.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur across the service.
///
/// Every variant maps to one of the stable error codes exposed on the
/// HTTP surface via [`DomainError::code`].
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Validation failed")]
    ValidationDetails(Vec<FieldError>),

    #[error("Invalid or expired credentials")]
    Unauthorized,

    #[error("Token invalid: {0}")]
    TokenInvalid(String),

    #[error("Operation not permitted")]
    Forbidden,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Department not found: {0}")]
    DepartmentNotFound(Uuid),

    #[error("Comment not found: {0}")]
    CommentNotFound(Uuid),

    #[error("Mail integration not found for provider {0}")]
    IntegrationNotFound(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Mail provider authorization expired; user must re-authorize")]
    ReauthRequired,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("Encryption error: {0}")]
    CryptoError(String),
}

/// Per-field diagnostic carried by `VALIDATION_ERROR` responses.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl DomainError {
    /// Stable error code exposed in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) | Self::ValidationDetails(_) => "VALIDATION_ERROR",
            Self::Unauthorized | Self::TokenInvalid(_) => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::UserNotFound(_)
            | Self::TaskNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::DepartmentNotFound(_)
            | Self::CommentNotFound(_)
            | Self::IntegrationNotFound(_)
            | Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ReauthRequired => "REAUTH_REQUIRED",
            Self::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::ExternalError(_)
            | Self::CryptoError(_) => "INTERNAL_ERROR",
        }
    }

    /// Field diagnostics, when the error carries them.
    pub fn details(&self) -> Option<&[FieldError]> {
        match self {
            Self::ValidationDetails(fields) => Some(fields),
            _ => None,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DomainError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DomainError::Conflict(db.message().to_string())
            }
            _ => DomainError::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        DomainError::ExternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            DomainError::ValidationFailed("x".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(DomainError::Forbidden.code(), "FORBIDDEN");
        assert_eq!(DomainError::TaskNotFound(Uuid::nil()).code(), "NOT_FOUND");
        assert_eq!(DomainError::Conflict("dup".into()).code(), "CONFLICT");
        assert_eq!(DomainError::ReauthRequired.code(), "REAUTH_REQUIRED");
        assert_eq!(
            DomainError::RateLimited("slow down".into()).code(),
            "RATE_LIMIT_EXCEEDED"
        );
        assert_eq!(
            DomainError::DatabaseError("boom".into()).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn validation_details_carry_fields() {
        let err = DomainError::ValidationDetails(vec![FieldError::new("title", "is required")]);
        let details = err.details().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field, "title");
    }
}
