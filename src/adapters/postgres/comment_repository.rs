//! Postgres implementations of the Comment and Attachment repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Attachment, Comment};
use crate::domain::ports::{AttachmentRepository, CommentRepository};

#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(&self, comment: &Comment) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO task_comments (id, task_id, author_id, content, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(comment.id)
        .bind(comment.task_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT * FROM task_comments WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update(&self, comment: &Comment) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE task_comments SET content = $1, updated_at = $2
               WHERE id = $3 AND deleted_at IS NULL"#,
        )
        .bind(&comment.content)
        .bind(comment.updated_at)
        .bind(comment.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::CommentNotFound(comment.id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE task_comments SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::CommentNotFound(id));
        }
        Ok(())
    }

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            r#"SELECT * FROM task_comments
               WHERE task_id = $1 AND deleted_at IS NULL
               ORDER BY created_at"#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn get(&self, id: Uuid) -> DomainResult<Option<Attachment>> {
        let row: Option<AttachmentRow> =
            sqlx::query_as("SELECT * FROM task_attachments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Attachment>> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(
            "SELECT * FROM task_attachments WHERE task_id = $1 ORDER BY uploaded_at",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    task_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            task_id: row.task_id,
            author_id: row.author_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: Uuid,
    task_id: Uuid,
    filename: String,
    content_type: String,
    size_bytes: i64,
    storage_path: String,
    uploaded_by: Uuid,
    uploaded_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Attachment {
            id: row.id,
            task_id: row.task_id,
            filename: row.filename,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            storage_path: row.storage_path,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
        }
    }
}
