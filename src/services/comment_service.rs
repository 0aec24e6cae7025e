//! Task comment service.
//!
//! Visibility piggybacks on task scope: whoever can read the task can
//! read its comments. Writing requires more than Viewer.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{Actor, Attachment, Comment, Role, MAX_COMMENT_LEN};
use crate::domain::ports::{AttachmentRepository, CommentRepository, TaskRepository};
use crate::services::authorization::task_scope;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            comments,
            attachments,
            tasks,
        }
    }

    pub async fn list(&self, actor: &Actor, task_id: Uuid) -> DomainResult<Vec<Comment>> {
        self.ensure_task_visible(actor, task_id).await?;
        self.comments.list_by_task(task_id).await
    }

    pub async fn create(
        &self,
        actor: &Actor,
        task_id: Uuid,
        content: &str,
    ) -> DomainResult<Comment> {
        self.ensure_task_visible(actor, task_id).await?;
        if actor.role == Role::Viewer {
            return Err(DomainError::Forbidden);
        }
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_COMMENT_LEN {
            return Err(DomainError::ValidationDetails(vec![FieldError::new(
                "content",
                format!("must be 1..{MAX_COMMENT_LEN} characters"),
            )]));
        }
        let comment = Comment::new(task_id, actor.user_id, trimmed);
        self.comments.create(&comment).await?;
        Ok(comment)
    }

    /// Soft-delete; author or admin only.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> DomainResult<()> {
        let comment = self
            .comments
            .get(id)
            .await?
            .ok_or(DomainError::CommentNotFound(id))?;
        if actor.role != Role::Admin && comment.author_id != actor.user_id {
            return Err(DomainError::Forbidden);
        }
        self.comments.soft_delete(id).await
    }

    pub async fn list_attachments(
        &self,
        actor: &Actor,
        task_id: Uuid,
    ) -> DomainResult<Vec<Attachment>> {
        self.ensure_task_visible(actor, task_id).await?;
        self.attachments.list_by_task(task_id).await
    }

    async fn ensure_task_visible(&self, actor: &Actor, task_id: Uuid) -> DomainResult<()> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;
        if !task_scope(actor).allows(&task) {
            return Err(DomainError::Forbidden);
        }
        Ok(())
    }
}
