//! Mail integration models.
//!
//! One `MailIntegration` row per (user, provider). The poller walks
//! enabled+connected integrations, fetches unread messages, and turns
//! them into tasks through the extractor. `MailProcessingLog` rows make
//! task creation at-most-once per (integration, provider message id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{TaskPriority, TaskStatus};

/// Supported mail providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    Zoho,
    Outlook,
}

impl MailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zoho => "zoho",
            Self::Outlook => "outlook",
        }
    }

    /// Parse a provider name; accepts the URL form `zoho-mail`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "zoho" | "zoho-mail" | "zoho_mail" => Some(Self::Zoho),
            "outlook" => Some(Self::Outlook),
            _ => None,
        }
    }
}

/// Connection state of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
    Syncing,
    Error,
    Expired,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Expired => "expired",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "syncing" => Some(Self::Syncing),
            "error" => Some(Self::Error),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// An OAuth-linked mailbox owned by a user.
///
/// Token columns hold AES-256-GCM ciphertext; the key id names the
/// process-held key that sealed them. Plaintext never reaches the store
/// or the logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailIntegration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: MailProvider,
    pub email_address: String,
    #[serde(skip_serializing)]
    pub access_token_enc: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_enc: Option<String>,
    /// Key id of the encryption key that sealed the token columns.
    pub key_id: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: IntegrationStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Provider-side cursor for incremental fetching, when supported.
    pub last_sync_message_id: Option<String>,
    pub sync_enabled: bool,
    /// Minutes between polls, 1..60.
    pub poll_interval_minutes: i32,
    /// Folders to monitor; defaults to the inbox.
    pub folders: Vec<String>,
    pub auto_create_tasks: bool,
    /// Suggestions below this confidence are logged, not created.
    pub min_confidence: f64,
    pub default_priority: TaskPriority,
    pub default_status: TaskStatus,
    pub error_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MailIntegration {
    pub fn new(user_id: Uuid, provider: MailProvider, email_address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider,
            email_address: email_address.into(),
            access_token_enc: None,
            refresh_token_enc: None,
            key_id: None,
            token_expires_at: None,
            status: IntegrationStatus::Disconnected,
            last_sync_at: None,
            last_sync_message_id: None,
            sync_enabled: true,
            poll_interval_minutes: 5,
            folders: vec!["INBOX".to_string()],
            auto_create_tasks: true,
            min_confidence: 0.7,
            default_priority: TaskPriority::Medium,
            default_status: TaskStatus::Todo,
            error_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of processing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Success,
    Failed,
    Skipped,
    NoTasks,
    LowConfidence,
}

impl ProcessingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NoTasks => "no_tasks",
            Self::LowConfidence => "low_confidence",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "no_tasks" => Some(Self::NoTasks),
            "low_confidence" => Some(Self::LowConfidence),
            _ => None,
        }
    }
}

/// Append-only record of one processed message. Unique per
/// (integration, provider message id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailProcessingLog {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub message_date: Option<DateTime<Utc>>,
    pub processed_at: DateTime<Utc>,
    pub outcome: ProcessingOutcome,
    pub tasks_created: i32,
    /// Extracted suggestions, persisted for audit and replay.
    pub suggestions: serde_json::Value,
    pub confidence: Option<f64>,
    /// Extractor identifier, e.g. `rules-v1`.
    pub extractor: String,
    pub retry_count: i32,
}

/// A message fetched from a provider mailbox, normalized across
/// providers before extraction.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Provider-scoped message id.
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub body_text: String,
    pub received_at: Option<DateTime<Utc>>,
    pub folder: String,
}

/// What the extractor proposes to create from a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub confidence: f64,
}
