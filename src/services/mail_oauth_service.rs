//! OAuth lifecycle for mail integrations.
//!
//! Initiate hands out the provider authorization URL with a CSRF state
//! bound to the requesting user; callback exchanges the code and
//! persists the integration with sealed tokens; disconnect revokes
//! upstream best-effort and zeros the token columns.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Actor, IntegrationStatus, MailIntegration, MailProcessingLog, MailProvider,
};
use crate::domain::ports::{MailIntegrationRepository, MailProviderClient};
use crate::services::state_store::StateStore;
use crate::services::token_crypto::TokenCipher;

pub struct MailOAuthService {
    integrations: Arc<dyn MailIntegrationRepository>,
    clients: HashMap<MailProvider, Arc<dyn MailProviderClient>>,
    cipher: TokenCipher,
    states: Arc<StateStore>,
}

impl MailOAuthService {
    pub fn new(
        integrations: Arc<dyn MailIntegrationRepository>,
        clients: HashMap<MailProvider, Arc<dyn MailProviderClient>>,
        cipher: TokenCipher,
        states: Arc<StateStore>,
    ) -> Self {
        Self {
            integrations,
            clients,
            cipher,
            states,
        }
    }

    fn client(&self, provider: MailProvider) -> DomainResult<&Arc<dyn MailProviderClient>> {
        self.clients.get(&provider).ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "provider {} is not configured",
                provider.as_str()
            ))
        })
    }

    /// Authorization URL for the provider, state bound to the actor.
    pub fn initiate(&self, actor: &Actor, provider: MailProvider) -> DomainResult<String> {
        let client = self.client(provider)?;
        let state = self.states.issue(Some(actor.user_id));
        client.authorize_url(&state)
    }

    /// Validate state, exchange the code, and store the integration.
    /// An existing row for (user, provider) is replaced with rotated
    /// tokens.
    pub async fn callback(
        &self,
        provider: MailProvider,
        code: &str,
        state: &str,
    ) -> DomainResult<MailIntegration> {
        let user_id = self
            .states
            .consume(state)
            .flatten()
            .ok_or_else(|| DomainError::ValidationFailed("invalid or expired state".into()))?;

        let client = self.client(provider)?;
        let tokens = client.exchange_code(code).await?;
        let email = client.account_email(&tokens.access_token).await?;

        let mut integration = match self.integrations.get_for_user(user_id, provider).await? {
            Some(existing) => existing,
            None => MailIntegration::new(user_id, provider, email.clone()),
        };
        integration.email_address = email;
        integration.access_token_enc = Some(self.cipher.encrypt(&tokens.access_token)?);
        integration.refresh_token_enc = match tokens.refresh_token.as_deref() {
            Some(refresh) => Some(self.cipher.encrypt(refresh)?),
            None => integration.refresh_token_enc,
        };
        integration.key_id = Some(self.cipher.key_id().to_string());
        integration.token_expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        integration.status = IntegrationStatus::Connected;
        integration.error_count = 0;
        integration.last_error = None;
        integration.updated_at = Utc::now();

        self.integrations.upsert(&integration).await?;
        tracing::info!(
            user_id = %user_id,
            provider = provider.as_str(),
            "mail integration connected"
        );
        Ok(integration)
    }

    /// Revoke upstream (best-effort), zero the sealed token columns,
    /// and mark the integration disconnected.
    pub async fn disconnect(&self, actor: &Actor, provider: MailProvider) -> DomainResult<()> {
        let mut integration = self
            .integrations
            .get_for_user(actor.user_id, provider)
            .await?
            .ok_or_else(|| DomainError::IntegrationNotFound(provider.as_str().into()))?;

        if let Some(sealed) = integration.refresh_token_enc.as_deref() {
            if let Ok(refresh) = self.cipher.decrypt(sealed) {
                if let Err(err) = self.client(provider)?.revoke(&refresh).await {
                    tracing::warn!(
                        provider = provider.as_str(),
                        error = %err,
                        "upstream token revocation failed; continuing disconnect"
                    );
                }
            }
        }

        integration.access_token_enc = None;
        integration.refresh_token_enc = None;
        integration.key_id = None;
        integration.token_expires_at = None;
        integration.status = IntegrationStatus::Disconnected;
        integration.updated_at = Utc::now();
        self.integrations.update(&integration).await
    }

    /// Integration status for the owning user.
    pub async fn status(
        &self,
        actor: &Actor,
        provider: MailProvider,
    ) -> DomainResult<MailIntegration> {
        self.integrations
            .get_for_user(actor.user_id, provider)
            .await?
            .ok_or_else(|| DomainError::IntegrationNotFound(provider.as_str().into()))
    }

    /// Recent processing history for the owning user's integration.
    pub async fn logs(
        &self,
        actor: &Actor,
        provider: MailProvider,
        limit: i64,
    ) -> DomainResult<Vec<MailProcessingLog>> {
        let integration = self.status(actor, provider).await?;
        self.integrations.list_logs(integration.id, limit).await
    }

    /// Resolve the integration id owned by `actor` for manual sync.
    pub async fn integration_id(
        &self,
        actor: &Actor,
        provider: MailProvider,
    ) -> DomainResult<Uuid> {
        Ok(self.status(actor, provider).await?.id)
    }
}
