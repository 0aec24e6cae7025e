//! Application services for the taskdesk core.

pub mod auth_service;
pub mod authorization;
pub mod comment_service;
pub mod department_service;
pub mod extraction;
pub mod mail_oauth_service;
pub mod mail_poller;
pub mod mail_sync_service;
pub mod project_service;
pub mod recurrence_service;
pub mod state_store;
pub mod task_service;
pub mod token_crypto;
pub mod user_service;

pub use auth_service::AuthService;
pub use comment_service::CommentService;
pub use department_service::{DepartmentInput, DepartmentService};
pub use extraction::MailExtractor;
pub use mail_oauth_service::MailOAuthService;
pub use mail_poller::{MailPoller, MailPollerConfig};
pub use mail_sync_service::{MailSyncService, SyncSummary};
pub use project_service::{ProjectInput, ProjectService};
pub use recurrence_service::RecurrenceService;
pub use state_store::StateStore;
pub use task_service::{CreateTaskInput, ListTasksInput, TaskService, UpdateTaskInput};
pub use token_crypto::TokenCipher;
pub use user_service::{UpdateUserInput, UserService};
