//! Mail provider client port.
//!
//! One implementation per provider (Zoho Mail, Microsoft Graph for
//! Outlook) with identical semantics, so the sync service never
//! branches on the provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{MailMessage, MailProvider};

/// Plaintext token set returned by the provider's token endpoint.
/// Lives only on the stack; persistence always goes through the cipher.
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when the provider reports one.
    pub expires_in: Option<i64>,
}

/// Client interface for one mail provider.
#[async_trait]
pub trait MailProviderClient: Send + Sync {
    fn provider(&self) -> MailProvider;

    /// Authorization URL carrying the CSRF `state`. Fails when the
    /// configured endpoint or redirect URL cannot be parsed.
    fn authorize_url(&self, state: &str) -> DomainResult<String>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> DomainResult<OAuthTokens>;

    /// Exchange a refresh token for a fresh access token.
    async fn refresh_token(&self, refresh_token: &str) -> DomainResult<OAuthTokens>;

    /// Best-effort upstream revocation of a refresh token.
    async fn revoke(&self, refresh_token: &str) -> DomainResult<()>;

    /// The mailbox address the token is bound to.
    async fn account_email(&self, access_token: &str) -> DomainResult<String>;

    /// Unread messages in `folder` received after `since`, oldest first.
    async fn fetch_unread(
        &self,
        access_token: &str,
        folder: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<MailMessage>>;
}
