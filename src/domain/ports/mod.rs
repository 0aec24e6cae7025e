//! Domain ports (interfaces) for the taskdesk service.

pub mod comment_repository;
pub mod department_repository;
pub mod identity_provider;
pub mod mail_client;
pub mod mail_repository;
pub mod project_repository;
pub mod recurrence_log_repository;
pub mod session_repository;
pub mod task_repository;
pub mod user_repository;

pub use comment_repository::{AttachmentRepository, CommentRepository};
pub use department_repository::DepartmentRepository;
pub use identity_provider::{FederatedIdentity, IdentityProvider};
pub use mail_client::{MailProviderClient, OAuthTokens};
pub use mail_repository::{MailIngestOutcome, MailIntegrationRepository};
pub use project_repository::{ProjectFilter, ProjectRepository};
pub use recurrence_log_repository::RecurrenceLogRepository;
pub use session_repository::SessionRepository;
pub use task_repository::{TaskFilter, TaskPage, TaskRepository};
pub use user_repository::UserRepository;
