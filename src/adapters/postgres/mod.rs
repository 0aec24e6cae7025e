//! Postgres adapters: connection management and one repository per
//! aggregate.

pub mod comment_repository;
pub mod connection;
pub mod department_repository;
pub mod mail_repository;
pub mod project_repository;
pub mod recurrence_log_repository;
pub mod session_repository;
pub mod task_repository;
pub mod user_repository;

pub use comment_repository::{PgAttachmentRepository, PgCommentRepository};
pub use connection::{create_pool, migrate, ConnectionError};
pub use department_repository::PgDepartmentRepository;
pub use mail_repository::PgMailIntegrationRepository;
pub use project_repository::PgProjectRepository;
pub use recurrence_log_repository::PgRecurrenceLogRepository;
pub use session_repository::PgSessionRepository;
pub use task_repository::PgTaskRepository;
pub use user_repository::PgUserRepository;
