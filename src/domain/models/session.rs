//! Session and actor models.
//!
//! Access tokens are stateless JWTs; refresh tokens are persisted
//! hashed so they can be rotated and revoked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Role;

/// A persisted refresh-token session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 of the refresh token; the plaintext is never stored.
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Claim set carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    pub permissions: Vec<String>,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    pub iss: String,
}

/// The authenticated principal for one operation.
///
/// Built once during token verification and passed through every
/// service call; the authorization filter derives scopes from it.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl Actor {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            department_id: claims.department_id,
            permissions: claims.permissions,
        }
    }
}

/// Token pair returned by login, federation, and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}
