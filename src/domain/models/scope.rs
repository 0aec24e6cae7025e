//! Resource scopes.
//!
//! A scope is the structured predicate derived from (actor, action,
//! resource type). Repositories compile scopes into SQL predicates;
//! services reuse them as in-memory checks on single rows, so the two
//! enforcement paths cannot drift apart.

use uuid::Uuid;

use super::task::Task;
use super::user::User;

/// Visibility predicate over tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    /// No restriction (Admin).
    All,
    /// Tasks within one department (Manager).
    Department(Uuid),
    /// Created-by OR same-department OR assigned (Member, Viewer).
    OwnDepartmentOrAssigned {
        user_id: Uuid,
        department_id: Option<Uuid>,
    },
}

impl TaskScope {
    /// Apply the predicate to a loaded row (assignees included).
    pub fn allows(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Department(dept) => task.department_id == Some(*dept),
            Self::OwnDepartmentOrAssigned {
                user_id,
                department_id,
            } => {
                task.creator_id == *user_id
                    || (department_id.is_some() && task.department_id == *department_id)
                    || task.is_assigned_to(*user_id)
            }
        }
    }
}

/// Visibility predicate over users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserScope {
    /// No restriction (Admin).
    All,
    /// Users within one department (Manager).
    Department(Uuid),
    /// Own record plus same-department users (Member, Viewer).
    SelfAndDepartment {
        user_id: Uuid,
        department_id: Option<Uuid>,
    },
}

impl UserScope {
    pub fn allows(&self, user: &User) -> bool {
        match self {
            Self::All => true,
            Self::Department(dept) => user.department_id == Some(*dept),
            Self::SelfAndDepartment {
                user_id,
                department_id,
            } => {
                user.id == *user_id
                    || (department_id.is_some() && user.department_id == *department_id)
            }
        }
    }
}

/// Visibility predicate over projects. Projects are readable service-wide
/// by every role holding `projects.read`; the scope restricts mutation
/// listings for managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    All,
    Department(Uuid),
}

impl ProjectScope {
    pub fn allows(&self, project: &super::project::Project) -> bool {
        match self {
            Self::All => true,
            Self::Department(dept) => project.department_id == Some(*dept),
        }
    }
}
