//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod attachment;
pub mod comment;
pub mod config;
pub mod department;
pub mod mail;
pub mod project;
pub mod recurrence;
pub mod scope;
pub mod session;
pub mod task;
pub mod user;

pub use attachment::{Attachment, MAX_ATTACHMENT_BYTES};
pub use comment::{Comment, MAX_COMMENT_LEN};
pub use config::{
    AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, MailConfig, MailProviderConfig,
    OidcConfig, ServerConfig,
};
pub use department::Department;
pub use mail::{
    IntegrationStatus, MailIntegration, MailMessage, MailProcessingLog, MailProvider,
    ProcessingOutcome, TaskSuggestion,
};
pub use project::{Project, ProjectStatus};
pub use recurrence::{Frequency, RecurrenceLogEntry, RecurrencePattern, RecurrenceRunStatus};
pub use scope::{ProjectScope, TaskScope, UserScope};
pub use session::{Actor, AuthTokens, Claims, Session};
pub use task::{
    SortOrder, Task, TaskAssignee, TaskPriority, TaskSortKey, TaskSource, TaskStatus,
};
pub use user::{Role, User};
