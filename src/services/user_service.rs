//! User registry service.
//!
//! Users are never deleted; deactivation preserves the referential
//! integrity of authored tasks and revokes open sessions.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{Actor, Role, User, UserScope};
use crate::domain::ports::{
    DepartmentRepository, SessionRepository, TaskPage, UserRepository,
};
use crate::services::authorization::{
    can_update_user, permissions, require_permission, user_scope,
};

/// Patch for user update. Profile fields may be self-edited; role,
/// department, and the active flag are admin-only.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub job_title: Option<Option<String>>,
    pub preferences: Option<serde_json::Value>,
    pub notification_settings: Option<serde_json::Value>,
    // Admin-only fields.
    pub role: Option<String>,
    pub department_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

impl UpdateUserInput {
    fn touches_admin_fields(&self) -> bool {
        self.role.is_some() || self.department_id.is_some() || self.is_active.is_some()
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    departments: Arc<dyn DepartmentRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        departments: Arc<dyn DepartmentRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            users,
            departments,
            sessions,
        }
    }

    pub async fn list(&self, actor: &Actor, page: TaskPage) -> DomainResult<(Vec<User>, u64)> {
        require_permission(actor, permissions::USERS_READ)?;
        let scope = user_scope(actor);
        self.users.list(&scope, &page.clamped()).await
    }

    /// Users of one department, regardless of the actor's own
    /// department. Gated on the admin-only departments permission.
    pub async fn list_in_department(
        &self,
        actor: &Actor,
        department_id: Uuid,
        page: TaskPage,
    ) -> DomainResult<(Vec<User>, u64)> {
        require_permission(actor, permissions::DEPARTMENTS_READ)?;
        self.users
            .list(&UserScope::Department(department_id), &page.clamped())
            .await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> DomainResult<User> {
        require_permission(actor, permissions::USERS_READ)?;
        let user = self
            .users
            .get(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))?;
        if !user_scope(actor).allows(&user) {
            return Err(DomainError::Forbidden);
        }
        Ok(user)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: UpdateUserInput,
    ) -> DomainResult<User> {
        let mut user = self
            .users
            .get(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))?;
        if !can_update_user(actor, &user, patch.touches_admin_fields()) {
            return Err(DomainError::Forbidden);
        }

        if let Some(ref name) = patch.name {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.len() > 255 {
                return Err(DomainError::ValidationDetails(vec![FieldError::new(
                    "name",
                    "must be 1..255 characters",
                )]));
            }
            user.name = trimmed.to_string();
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = avatar_url;
        }
        if let Some(job_title) = patch.job_title {
            user.job_title = job_title;
        }
        if let Some(preferences) = patch.preferences {
            user.preferences = preferences;
        }
        if let Some(settings) = patch.notification_settings {
            user.notification_settings = settings;
        }

        if let Some(ref role) = patch.role {
            let parsed = Role::from_str(role).ok_or_else(|| {
                DomainError::ValidationDetails(vec![FieldError::new(
                    "role",
                    format!("unknown value '{role}'"),
                )])
            })?;
            user.role = parsed;
        }
        if let Some(department_id) = patch.department_id {
            if let Some(dept) = department_id {
                self.departments
                    .get(dept)
                    .await?
                    .ok_or(DomainError::DepartmentNotFound(dept))?;
            }
            user.department_id = department_id;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
            if !is_active {
                self.sessions.revoke_for_user(user.id).await?;
            }
        }

        user.updated_at = Utc::now();
        self.users.update(&user).await?;
        Ok(user)
    }

    /// "Delete" a user: deactivate and revoke sessions. Admin only.
    pub async fn deactivate(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        require_permission(actor, permissions::USERS_DELETE)?;
        self.users
            .get(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))?;
        self.users.deactivate(id).await?;
        self.sessions.revoke_for_user(id).await?;
        Ok(())
    }
}
