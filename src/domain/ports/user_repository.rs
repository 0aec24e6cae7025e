//! User repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{User, UserScope};

use super::task_repository::TaskPage;

/// Repository interface for User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<User>>;

    /// Case-insensitive email lookup.
    async fn get_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    /// Lookup by the federated OIDC subject.
    async fn get_by_oidc_subject(&self, subject: &str) -> DomainResult<Option<User>>;

    async fn update(&self, user: &User) -> DomainResult<()>;

    /// Soft-deactivate. The row stays for referential integrity.
    async fn deactivate(&self, id: Uuid) -> DomainResult<()>;

    /// List users within `scope`. Returns (rows, total count).
    async fn list(&self, scope: &UserScope, page: &TaskPage) -> DomainResult<(Vec<User>, u64)>;

    /// Count users referencing a department.
    async fn count_by_department(&self, department_id: Uuid) -> DomainResult<u64>;

    /// Whether any user exists at all (first registration becomes Admin).
    async fn any_exists(&self) -> DomainResult<bool>;
}
