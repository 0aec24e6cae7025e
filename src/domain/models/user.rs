//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned to a user. Determines the permission set and the
/// resource scope applied to every query the user issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unrestricted access to all resources.
    Admin,
    /// Full task control and project management within own department.
    Manager,
    /// Creates and works tasks; read access to projects and users.
    Member,
    /// Read-only access.
    Viewer,
}

impl Default for Role {
    fn default() -> Self {
        Self::Member
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "member" => Some(Self::Member),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// A registered user.
///
/// Users are created on first identity federation or local registration
/// and are deactivated rather than deleted, so that authored tasks keep
/// a valid creator reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique, matched case-insensitively.
    pub email: String,
    pub name: String,
    /// Argon2 digest. Absent for federated-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub department_id: Option<Uuid>,
    /// Subject claim from the primary OIDC issuer.
    pub oidc_subject: Option<String>,
    /// Subject from a secondary identity provider, when linked.
    pub secondary_subject: Option<String>,
    pub avatar_url: Option<String>,
    pub job_title: Option<String>,
    pub is_active: bool,
    /// Opaque UI preference blob; the core never interprets it.
    pub preferences: serde_json::Value,
    /// Opaque notification settings blob.
    pub notification_settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user with defaults suitable for local registration.
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: name.into(),
            password_hash: None,
            role,
            department_id: None,
            oidc_subject: None,
            secondary_subject: None,
            avatar_url: None,
            job_title: None,
            is_active: true,
            preferences: serde_json::Value::Object(Default::default()),
            notification_settings: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::Manager, Role::Member, Role::Viewer] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("root"), None);
    }

    #[test]
    fn new_user_is_active_with_empty_blobs() {
        let user = User::new("a@example.com", "A", Role::Member);
        assert!(user.is_active);
        assert!(user.password_hash.is_none());
        assert!(user.preferences.as_object().unwrap().is_empty());
    }
}
