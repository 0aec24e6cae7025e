//! Project registry service.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{Actor, Project, ProjectStatus};
use crate::domain::ports::{
    DepartmentRepository, ProjectFilter, ProjectRepository, TaskPage, TaskRepository,
    UserRepository,
};
use crate::services::authorization::{
    can_delete_project, can_mutate_project, permissions, project_scope, require_permission,
};

#[derive(Debug, Clone, Default)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub department_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    departments: Arc<dyn DepartmentRepository>,
    users: Arc<dyn UserRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        departments: Arc<dyn DepartmentRepository>,
        users: Arc<dyn UserRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            projects,
            departments,
            users,
            tasks,
        }
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: ProjectFilter,
        page: TaskPage,
    ) -> DomainResult<(Vec<Project>, u64)> {
        require_permission(actor, permissions::PROJECTS_READ)?;
        let scope = project_scope(actor);
        self.projects.list(&filter, &scope, &page.clamped()).await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> DomainResult<Project> {
        require_permission(actor, permissions::PROJECTS_READ)?;
        let project = self
            .projects
            .get(id)
            .await?
            .ok_or(DomainError::ProjectNotFound(id))?;
        if !project_scope(actor).allows(&project) {
            return Err(DomainError::Forbidden);
        }
        Ok(project)
    }

    pub async fn create(&self, actor: &Actor, input: ProjectInput) -> DomainResult<Project> {
        require_permission(actor, permissions::PROJECTS_CREATE)?;
        // Managers create inside their own department only.
        let department_id = input.department_id.or(actor.department_id);
        if !can_mutate_project(actor, department_id) {
            return Err(DomainError::Forbidden);
        }
        let (status, start_date, end_date) = self.validate(&input).await?;

        let mut project = Project::new(input.name.trim());
        project.description = input.description;
        project.status = status;
        project.department_id = department_id;
        project.owner_id = input.owner_id;
        project.start_date = start_date;
        project.end_date = end_date;
        self.projects.create(&project).await?;
        Ok(project)
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, input: ProjectInput) -> DomainResult<Project> {
        require_permission(actor, permissions::PROJECTS_UPDATE)?;
        let mut project = self
            .projects
            .get(id)
            .await?
            .ok_or(DomainError::ProjectNotFound(id))?;
        if !can_mutate_project(actor, project.department_id) {
            return Err(DomainError::Forbidden);
        }
        // Re-homing the project into another department is still bound
        // by the actor's mutation scope.
        if input.department_id.is_some()
            && input.department_id != project.department_id
            && !can_mutate_project(actor, input.department_id)
        {
            return Err(DomainError::Forbidden);
        }
        let (status, start_date, end_date) = self.validate(&input).await?;

        project.name = input.name.trim().to_string();
        project.description = input.description;
        project.status = status;
        if input.department_id.is_some() {
            project.department_id = input.department_id;
        }
        project.owner_id = input.owner_id;
        project.start_date = start_date;
        project.end_date = end_date;
        project.updated_at = Utc::now();
        self.projects.update(&project).await?;
        Ok(project)
    }

    /// Delete, refused with Conflict while tasks reference the project.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        let project = self
            .projects
            .get(id)
            .await?
            .ok_or(DomainError::ProjectNotFound(id))?;
        if !can_delete_project(actor, &project) {
            return Err(DomainError::Forbidden);
        }
        let task_count = self.tasks.count_by_project(id).await?;
        if task_count > 0 {
            return Err(DomainError::Conflict(format!(
                "project has {task_count} tasks"
            )));
        }
        self.projects.delete(id).await
    }

    async fn validate(
        &self,
        input: &ProjectInput,
    ) -> DomainResult<(ProjectStatus, Option<NaiveDate>, Option<NaiveDate>)> {
        let mut errors = Vec::new();
        let name = input.name.trim();
        if name.is_empty() || name.len() > 255 {
            errors.push(FieldError::new("name", "must be 1..255 characters"));
        }
        let status = match input.status.as_deref() {
            None => ProjectStatus::Active,
            Some(s) => match ProjectStatus::from_str(s) {
                Some(status) => status,
                None => {
                    errors.push(FieldError::new("status", format!("unknown value '{s}'")));
                    ProjectStatus::Active
                }
            },
        };
        if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
            if end < start {
                errors.push(FieldError::new("end_date", "must not precede start_date"));
            }
        }
        if !errors.is_empty() {
            return Err(DomainError::ValidationDetails(errors));
        }

        if let Some(dept) = input.department_id {
            self.departments
                .get(dept)
                .await?
                .ok_or(DomainError::DepartmentNotFound(dept))?;
        }
        if let Some(owner) = input.owner_id {
            self.users
                .get(owner)
                .await?
                .ok_or(DomainError::UserNotFound(owner))?;
        }
        Ok((status, input.start_date, input.end_date))
    }
}
