//! Project domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Completed,
    Archived,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "on_hold" | "on-hold" => Some(Self::OnHold),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// A project grouping tasks, optionally bound to a department and owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub department_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    /// When both dates are present, `end_date >= start_date`.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            status: ProjectStatus::Active,
            department_id: None,
            owner_id: None,
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Date-range invariant check used by create/update validation.
    pub fn dates_valid(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            ProjectStatus::Active,
            ProjectStatus::OnHold,
            ProjectStatus::Completed,
            ProjectStatus::Archived,
        ] {
            assert_eq!(ProjectStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn end_before_start_is_invalid() {
        let mut project = Project::new("Rollout");
        project.start_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        project.end_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        assert!(!project.dates_valid());
        project.end_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(project.dates_valid());
    }
}
