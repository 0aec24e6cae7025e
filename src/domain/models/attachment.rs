//! Task attachment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on attachment size: 100 MiB.
pub const MAX_ATTACHMENT_BYTES: i64 = 100 * 1024 * 1024;

/// A file attached to a task. The bytes live at `storage_path`; the
/// core only tracks the reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}
