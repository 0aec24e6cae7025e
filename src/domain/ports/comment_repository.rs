//! Comment and attachment repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Attachment, Comment};

/// Repository interface for Comment persistence. Soft-deleted comments
/// are invisible to every read here.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Comment>>;

    async fn update(&self, comment: &Comment) -> DomainResult<()>;

    /// Soft-delete: stamps `deleted_at`, keeps the row.
    async fn soft_delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Comment>>;
}

/// Read-side repository for attachments. Upload and storage are the
/// presentation layer's concern; the core only lists references.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> DomainResult<Option<Attachment>>;

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Attachment>>;
}
