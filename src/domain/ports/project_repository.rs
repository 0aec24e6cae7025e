//! Project repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, ProjectScope, ProjectStatus};

use super::task_repository::TaskPage;

/// Filter criteria for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub department_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
}

/// Repository interface for Project persistence.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>>;

    async fn update(&self, project: &Project) -> DomainResult<()>;

    /// Delete the row. Callers must have verified no task references it.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(
        &self,
        filter: &ProjectFilter,
        scope: &ProjectScope,
        page: &TaskPage,
    ) -> DomainResult<(Vec<Project>, u64)>;
}
