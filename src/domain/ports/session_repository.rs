//! Session repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Session;

/// Repository interface for refresh-token sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> DomainResult<()>;

    /// Lookup by the SHA-256 hash of a presented refresh token.
    async fn get_by_token_hash(&self, hash: &str) -> DomainResult<Option<Session>>;

    /// Mark a session revoked.
    async fn revoke(&self, id: Uuid) -> DomainResult<()>;

    /// Revoke every session of a user (logout-everywhere, deactivation).
    async fn revoke_for_user(&self, user_id: Uuid) -> DomainResult<u64>;

    /// Drop sessions past expiry. Returns the number removed.
    async fn delete_expired(&self) -> DomainResult<u64>;
}
