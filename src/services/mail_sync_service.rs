//! Per-integration mail sync.
//!
//! One pass over one integration: refresh tokens when near expiry,
//! fetch unread messages from the monitored folders, extract, and
//! create tasks with at-most-once semantics per (integration, message).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    IntegrationStatus, MailIntegration, MailMessage, MailProcessingLog, MailProvider,
    ProcessingOutcome, Task, TaskSource,
};
use crate::domain::ports::{
    MailIngestOutcome, MailIntegrationRepository, MailProviderClient, UserRepository,
};
use crate::services::extraction::{MailExtractor, EXTRACTOR_TAG};
use crate::services::token_crypto::TokenCipher;

/// Refresh when the access token expires within this margin.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Counters for one sync pass over one integration.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub created: usize,
    pub skipped: usize,
}

pub struct MailSyncService {
    integrations: Arc<dyn MailIntegrationRepository>,
    users: Arc<dyn UserRepository>,
    clients: HashMap<MailProvider, Arc<dyn MailProviderClient>>,
    cipher: TokenCipher,
    extractor: MailExtractor,
}

impl MailSyncService {
    pub fn new(
        integrations: Arc<dyn MailIntegrationRepository>,
        users: Arc<dyn UserRepository>,
        clients: HashMap<MailProvider, Arc<dyn MailProviderClient>>,
        cipher: TokenCipher,
    ) -> Self {
        Self {
            integrations,
            users,
            clients,
            cipher,
            extractor: MailExtractor::new(),
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

    /// Run one sync pass for the integration.
    ///
    /// Transient provider failures leave `last_sync_at` untouched so
    /// the same window is retried next pass; token-refresh failures
    /// park the integration as `expired` until re-authorization.
    pub async fn sync_integration(&self, integration_id: Uuid) -> DomainResult<SyncSummary> {
        let mut integration = self
            .integrations
            .get(integration_id)
            .await?
            .ok_or_else(|| DomainError::IntegrationNotFound(integration_id.to_string()))?;

        if !integration.sync_enabled || integration.status != IntegrationStatus::Connected {
            return Err(DomainError::ValidationFailed(format!(
                "integration is {} and cannot sync",
                integration.status.as_str()
            )));
        }

        integration.status = IntegrationStatus::Syncing;
        integration.updated_at = Utc::now();
        self.integrations.update(&integration).await?;

        match self.sync_inner(&mut integration).await {
            Ok(summary) => {
                integration.status = IntegrationStatus::Connected;
                integration.last_sync_at = Some(Utc::now());
                integration.error_count = 0;
                integration.last_error = None;
                integration.updated_at = Utc::now();
                self.integrations.update(&integration).await?;
                tracing::info!(
                    integration_id = %integration.id,
                    fetched = summary.fetched,
                    created = summary.created,
                    skipped = summary.skipped,
                    "mail sync pass complete"
                );
                Ok(summary)
            }
            Err(DomainError::ReauthRequired) => {
                integration.status = IntegrationStatus::Expired;
                integration.last_error = Some("token refresh failed".into());
                integration.updated_at = Utc::now();
                self.integrations.update(&integration).await?;
                Err(DomainError::ReauthRequired)
            }
            Err(err) => {
                // Transient: keep last_sync_at so the window is retried.
                integration.status = IntegrationStatus::Error;
                integration.error_count += 1;
                integration.last_error = Some(err.to_string());
                integration.updated_at = Utc::now();
                self.integrations.update(&integration).await?;
                Err(err)
            }
        }
    }

    async fn sync_inner(&self, integration: &mut MailIntegration) -> DomainResult<SyncSummary> {
        let access_token = self.refresh_if_needed(integration).await?;
        let client = self.client(integration.provider)?;
        let owner = self
            .users
            .get(integration.user_id)
            .await?
            .ok_or(DomainError::UserNotFound(integration.user_id))?;

        let mut summary = SyncSummary::default();
        let folders = integration.folders.clone();
        for folder in &folders {
            let messages = client
                .fetch_unread(&access_token, folder, integration.last_sync_at)
                .await?;
            summary.fetched += messages.len();

            for message in messages {
                if self
                    .integrations
                    .is_processed(integration.id, &message.id)
                    .await?
                {
                    summary.skipped += 1;
                    integration.last_sync_message_id = Some(message.id.clone());
                    continue;
                }
                // Store-level failures are transient: they propagate so
                // the caller leaves last_sync untouched and the message
                // is retried next pass. The incremental high-water mark
                // only advances past messages with a logged outcome.
                match self.process_message(integration, &owner, &message).await? {
                    ProcessingOutcome::Success => summary.created += 1,
                    _ => summary.skipped += 1,
                }
                integration.last_sync_message_id = Some(message.id.clone());
            }
        }
        Ok(summary)
    }

    /// Extract and, when the gates pass, create the task together with
    /// its log row in one transaction.
    async fn process_message(
        &self,
        integration: &MailIntegration,
        owner: &crate::domain::models::User,
        message: &MailMessage,
    ) -> DomainResult<ProcessingOutcome> {
        let suggestion = self.extractor.extract(message, integration);

        let mut log = MailProcessingLog {
            id: Uuid::new_v4(),
            integration_id: integration.id,
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            sender: message.sender.clone(),
            message_date: message.received_at,
            processed_at: Utc::now(),
            outcome: ProcessingOutcome::Success,
            tasks_created: 0,
            suggestions: serde_json::to_value(&suggestion)?,
            confidence: Some(suggestion.confidence),
            extractor: EXTRACTOR_TAG.to_string(),
            retry_count: 0,
        };

        if !integration.auto_create_tasks {
            log.outcome = ProcessingOutcome::Skipped;
            self.integrations.record_log(&log).await?;
            return Ok(ProcessingOutcome::Skipped);
        }
        if suggestion.confidence < integration.min_confidence {
            log.outcome = ProcessingOutcome::LowConfidence;
            self.integrations.record_log(&log).await?;
            return Ok(ProcessingOutcome::LowConfidence);
        }

        // Created as the integration's owner; interactive scope checks
        // do not apply on this path.
        let mut task = Task::new(suggestion.title.clone(), owner.id);
        task.description = suggestion.description.clone();
        task.status = integration.default_status;
        task.priority = suggestion.priority;
        task.source = TaskSource::Email;
        task.department_id = owner.department_id;
        task.due_date = suggestion.due_date;
        task.confidence_score = Some(suggestion.confidence);
        task.metadata = serde_json::json!({
            "provider": integration.provider.as_str(),
            "message_id": message.id,
            "sender": message.sender,
            "subject": message.subject,
            "received_at": message.received_at.map(|t| t.to_rfc3339()),
        });

        log.tasks_created = 1;
        match self
            .integrations
            .create_task_with_log(&task, &[], &log)
            .await?
        {
            MailIngestOutcome::Created(created) => {
                tracing::info!(
                    task_id = %created.id,
                    external_id = %created.external_id,
                    integration_id = %integration.id,
                    "task created from mail message"
                );
                Ok(ProcessingOutcome::Success)
            }
            MailIngestOutcome::Duplicate => {
                // A concurrent pass won the unique-constraint race;
                // that is a successful dedup, not a failure.
                tracing::debug!(
                    integration_id = %integration.id,
                    message_id = %message.id,
                    "duplicate message detected on insert"
                );
                Ok(ProcessingOutcome::Skipped)
            }
        }
    }

    /// Decrypt the access token, refreshing first when expiry is within
    /// the safety margin. Persists rotated tokens before returning.
    async fn refresh_if_needed(&self, integration: &mut MailIntegration) -> DomainResult<String> {
        let near_expiry = integration
            .token_expires_at
            .map(|at| at <= Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS))
            .unwrap_or(true);

        if !near_expiry {
            let sealed = integration
                .access_token_enc
                .as_deref()
                .ok_or(DomainError::ReauthRequired)?;
            return self.cipher.decrypt(sealed);
        }

        let sealed_refresh = integration
            .refresh_token_enc
            .as_deref()
            .ok_or(DomainError::ReauthRequired)?;
        let refresh_token = self.cipher.decrypt(sealed_refresh)?;

        let client = self.client(integration.provider)?;
        let tokens = client
            .refresh_token(&refresh_token)
            .await
            .map_err(|err| {
                tracing::warn!(
                    integration_id = %integration.id,
                    error = %err,
                    "access token refresh failed"
                );
                DomainError::ReauthRequired
            })?;

        integration.access_token_enc = Some(self.cipher.encrypt(&tokens.access_token)?);
        if let Some(ref new_refresh) = tokens.refresh_token {
            integration.refresh_token_enc = Some(self.cipher.encrypt(new_refresh)?);
        }
        integration.key_id = Some(self.cipher.key_id().to_string());
        integration.token_expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        integration.updated_at = Utc::now();
        self.integrations.update(integration).await?;

        Ok(tokens.access_token)
    }
}
