//! Department domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organizational unit. Departments form a hierarchy via `parent_id`
/// and scope what non-admin users can see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    /// Unique across the deployment.
    pub name: String,
    pub description: Option<String>,
    /// Department head, when appointed.
    pub head_id: Option<Uuid>,
    /// Parent department. Never equal to `id`.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            head_id: None,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
