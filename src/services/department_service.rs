//! Department registry service. All mutations are admin-only; deletes
//! are refused while any user or task still references the department.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{Actor, Department};
use crate::domain::ports::{
    DepartmentRepository, TaskRepository, UserRepository,
};
use crate::services::authorization::{permissions, require_permission};

#[derive(Debug, Clone, Default)]
pub struct DepartmentInput {
    pub name: String,
    pub description: Option<String>,
    pub head_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
}

pub struct DepartmentService {
    departments: Arc<dyn DepartmentRepository>,
    users: Arc<dyn UserRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl DepartmentService {
    pub fn new(
        departments: Arc<dyn DepartmentRepository>,
        users: Arc<dyn UserRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            departments,
            users,
            tasks,
        }
    }

    pub async fn list(&self, actor: &Actor) -> DomainResult<Vec<Department>> {
        require_permission(actor, permissions::DEPARTMENTS_READ)?;
        self.departments.list().await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> DomainResult<Department> {
        require_permission(actor, permissions::DEPARTMENTS_READ)?;
        self.departments
            .get(id)
            .await?
            .ok_or(DomainError::DepartmentNotFound(id))
    }

    pub async fn create(&self, actor: &Actor, input: DepartmentInput) -> DomainResult<Department> {
        require_permission(actor, permissions::DEPARTMENTS_CREATE)?;
        self.validate(&input, None).await?;

        let mut department = Department::new(input.name.trim());
        department.description = input.description;
        department.head_id = input.head_id;
        department.parent_id = input.parent_id;
        self.departments.create(&department).await?;
        Ok(department)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        input: DepartmentInput,
    ) -> DomainResult<Department> {
        require_permission(actor, permissions::DEPARTMENTS_UPDATE)?;
        let mut department = self
            .departments
            .get(id)
            .await?
            .ok_or(DomainError::DepartmentNotFound(id))?;
        self.validate(&input, Some(id)).await?;

        department.name = input.name.trim().to_string();
        department.description = input.description;
        department.head_id = input.head_id;
        department.parent_id = input.parent_id;
        department.updated_at = Utc::now();
        self.departments.update(&department).await?;
        Ok(department)
    }

    /// Delete, refused with Conflict while referenced.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        require_permission(actor, permissions::DEPARTMENTS_DELETE)?;
        self.departments
            .get(id)
            .await?
            .ok_or(DomainError::DepartmentNotFound(id))?;

        let user_count = self.users.count_by_department(id).await?;
        if user_count > 0 {
            return Err(DomainError::Conflict(format!(
                "department has {user_count} users"
            )));
        }
        let task_count = self.tasks.count_by_department(id).await?;
        if task_count > 0 {
            return Err(DomainError::Conflict(format!(
                "department has {task_count} tasks"
            )));
        }
        self.departments.delete(id).await
    }

    async fn validate(&self, input: &DepartmentInput, updating: Option<Uuid>) -> DomainResult<()> {
        let name = input.name.trim();
        if name.is_empty() || name.len() > 255 {
            return Err(DomainError::ValidationDetails(vec![FieldError::new(
                "name",
                "must be 1..255 characters",
            )]));
        }
        if let Some(existing) = self.departments.get_by_name(name).await? {
            if updating != Some(existing.id) {
                return Err(DomainError::Conflict(format!(
                    "a department named '{name}' already exists"
                )));
            }
        }
        if let Some(head) = input.head_id {
            self.users
                .get(head)
                .await?
                .ok_or(DomainError::UserNotFound(head))?;
        }
        if let Some(parent) = input.parent_id {
            // No self-parenting.
            if updating == Some(parent) {
                return Err(DomainError::ValidationDetails(vec![FieldError::new(
                    "parent_id",
                    "a department cannot be its own parent",
                )]));
            }
            self.departments
                .get(parent)
                .await?
                .ok_or(DomainError::DepartmentNotFound(parent))?;
        }
        Ok(())
    }
}
