//! Department repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Department;

/// Repository interface for Department persistence.
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    async fn create(&self, department: &Department) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Department>>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Department>>;

    async fn update(&self, department: &Department) -> DomainResult<()>;

    /// Delete the row. Callers must have verified no user or task still
    /// references it.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<Department>>;
}
