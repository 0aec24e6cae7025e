//! Authorization filter.
//!
//! Translates (actor, action, resource type) into permission checks,
//! structured scopes for query building, and mutation gates. The role
//! to permission mapping is fixed; nothing here reads the database.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, Project, ProjectScope, Role, Task, TaskScope, User, UserScope,
};

/// Permission names, `<resource>.<verb>`.
pub mod permissions {
    pub const TASKS_CREATE: &str = "tasks.create";
    pub const TASKS_READ: &str = "tasks.read";
    pub const TASKS_UPDATE: &str = "tasks.update";
    pub const TASKS_DELETE: &str = "tasks.delete";
    pub const USERS_CREATE: &str = "users.create";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_UPDATE: &str = "users.update";
    pub const USERS_DELETE: &str = "users.delete";
    pub const PROJECTS_CREATE: &str = "projects.create";
    pub const PROJECTS_READ: &str = "projects.read";
    pub const PROJECTS_UPDATE: &str = "projects.update";
    pub const PROJECTS_DELETE: &str = "projects.delete";
    pub const DEPARTMENTS_CREATE: &str = "departments.create";
    pub const DEPARTMENTS_READ: &str = "departments.read";
    pub const DEPARTMENTS_UPDATE: &str = "departments.update";
    pub const DEPARTMENTS_DELETE: &str = "departments.delete";
}

use permissions::*;

/// The fixed permission set for a role.
pub fn role_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[
            TASKS_CREATE,
            TASKS_READ,
            TASKS_UPDATE,
            TASKS_DELETE,
            USERS_CREATE,
            USERS_READ,
            USERS_UPDATE,
            USERS_DELETE,
            PROJECTS_CREATE,
            PROJECTS_READ,
            PROJECTS_UPDATE,
            PROJECTS_DELETE,
            DEPARTMENTS_CREATE,
            DEPARTMENTS_READ,
            DEPARTMENTS_UPDATE,
            DEPARTMENTS_DELETE,
        ],
        Role::Manager => &[
            TASKS_CREATE,
            TASKS_READ,
            TASKS_UPDATE,
            TASKS_DELETE,
            PROJECTS_CREATE,
            PROJECTS_READ,
            PROJECTS_UPDATE,
            USERS_READ,
        ],
        Role::Member => &[
            TASKS_CREATE,
            TASKS_READ,
            TASKS_UPDATE,
            PROJECTS_READ,
            USERS_READ,
        ],
        Role::Viewer => &[TASKS_READ, PROJECTS_READ, USERS_READ],
    }
}

/// Fail with `Forbidden` unless the actor holds `permission`.
pub fn require_permission(actor: &Actor, permission: &str) -> DomainResult<()> {
    if actor.has_permission(permission) {
        Ok(())
    } else {
        Err(DomainError::Forbidden)
    }
}

/// Task visibility scope for the actor.
///
/// A manager without a department degrades to the member predicate:
/// there is no department to widen into.
pub fn task_scope(actor: &Actor) -> TaskScope {
    match (actor.role, actor.department_id) {
        (Role::Admin, _) => TaskScope::All,
        (Role::Manager, Some(dept)) => TaskScope::Department(dept),
        _ => TaskScope::OwnDepartmentOrAssigned {
            user_id: actor.user_id,
            department_id: actor.department_id,
        },
    }
}

/// User visibility scope for the actor.
pub fn user_scope(actor: &Actor) -> UserScope {
    match (actor.role, actor.department_id) {
        (Role::Admin, _) => UserScope::All,
        (Role::Manager, Some(dept)) => UserScope::Department(dept),
        _ => UserScope::SelfAndDepartment {
            user_id: actor.user_id,
            department_id: actor.department_id,
        },
    }
}

/// Project visibility scope. Projects are readable service-wide for
/// every role holding `projects.read`; managers are narrowed to their
/// department so their listings match what they can mutate.
pub fn project_scope(actor: &Actor) -> ProjectScope {
    match (actor.role, actor.department_id) {
        (Role::Manager, Some(dept)) => ProjectScope::Department(dept),
        _ => ProjectScope::All,
    }
}

/// Whether the actor may update this task.
pub fn can_update_task(actor: &Actor, task: &Task) -> bool {
    if !actor.has_permission(TASKS_UPDATE) {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Manager => {
            actor.department_id.is_some() && task.department_id == actor.department_id
        }
        Role::Member => {
            task.creator_id == actor.user_id || task.is_assigned_to(actor.user_id)
        }
        Role::Viewer => false,
    }
}

/// Whether the actor may delete this task: admin, or its creator
/// (holding `tasks.delete`).
pub fn can_delete_task(actor: &Actor, task: &Task) -> bool {
    if !actor.has_permission(TASKS_DELETE) {
        return false;
    }
    actor.role == Role::Admin || task.creator_id == actor.user_id
}

/// Whether the actor may create or update a project bound to
/// `department_id`.
pub fn can_mutate_project(actor: &Actor, department_id: Option<uuid::Uuid>) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => {
            actor.department_id.is_some() && department_id == actor.department_id
        }
        _ => false,
    }
}

/// Whether the actor may delete this project (the task-reference check
/// happens in the service, against the store).
pub fn can_delete_project(actor: &Actor, project: &Project) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => {
            actor.department_id.is_some() && project.department_id == actor.department_id
        }
        _ => false,
    }
}

/// Whether the actor may apply `admin_fields` (role/department/active
/// changes) to `target`. Profile fields are self-editable; role,
/// department, and the active flag are admin-only, even on self.
/// Self-downgrade by an admin is permitted.
pub fn can_update_user(actor: &Actor, target: &User, admin_fields: bool) -> bool {
    if admin_fields {
        return actor.role == Role::Admin;
    }
    actor.role == Role::Admin || actor.user_id == target.id
}
