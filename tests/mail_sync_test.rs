//! Mail sync behavior: at-most-once task creation, confidence gating,
//! token refresh failure handling, and transient-error retry.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use common::{make_user, InMemoryMailRepository, InMemoryUserRepository};
use taskdesk::domain::errors::{DomainError, DomainResult};
use taskdesk::domain::models::{
    IntegrationStatus, MailIntegration, MailMessage, MailProvider, ProcessingOutcome, Role,
    TaskSource, User,
};
use taskdesk::domain::ports::{MailProviderClient, OAuthTokens};
use taskdesk::services::{MailSyncService, TokenCipher};

/// Scripted provider client: serves a fixed message set, optionally
/// failing fetches or refreshes.
struct FakeMailClient {
    messages: Mutex<Vec<MailMessage>>,
    fail_fetch: AtomicBool,
    fail_refresh: AtomicBool,
    refresh_calls: AtomicUsize,
}

impl FakeMailClient {
    fn new(messages: Vec<MailMessage>) -> Self {
        Self {
            messages: Mutex::new(messages),
            fail_fetch: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MailProviderClient for FakeMailClient {
    fn provider(&self) -> MailProvider {
        MailProvider::Zoho
    }

    fn authorize_url(&self, state: &str) -> DomainResult<String> {
        Ok(format!("https://fake.example.com/auth?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> DomainResult<OAuthTokens> {
        Ok(OAuthTokens {
            access_token: "fake-access".into(),
            refresh_token: Some("fake-refresh".into()),
            expires_in: Some(3600),
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> DomainResult<OAuthTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(DomainError::ExternalError("invalid_grant".into()));
        }
        Ok(OAuthTokens {
            access_token: "refreshed-access".into(),
            refresh_token: Some("rotated-refresh".into()),
            expires_in: Some(3600),
        })
    }

    async fn revoke(&self, _refresh_token: &str) -> DomainResult<()> {
        Ok(())
    }

    async fn account_email(&self, _access_token: &str) -> DomainResult<String> {
        Ok("inbox@example.com".into())
    }

    async fn fetch_unread(
        &self,
        _access_token: &str,
        _folder: &str,
        _since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<MailMessage>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(DomainError::ExternalError("503 from provider".into()));
        }
        Ok(self.messages.lock().unwrap().clone())
    }
}

fn message(id: &str, subject: &str, body: &str) -> MailMessage {
    MailMessage {
        id: id.into(),
        subject: subject.into(),
        sender: "sender@example.com".into(),
        body_text: body.into(),
        received_at: Some(Utc::now() - Duration::minutes(5)),
        folder: "INBOX".into(),
    }
}

fn cipher() -> TokenCipher {
    TokenCipher::new(&BASE64.encode([9u8; 32]), "k-test").unwrap()
}

struct Fixture {
    sync: Arc<MailSyncService>,
    mail: Arc<InMemoryMailRepository>,
    client: Arc<FakeMailClient>,
    owner: User,
    integration: MailIntegration,
}

fn fixture(messages: Vec<MailMessage>) -> Fixture {
    let mail = Arc::new(InMemoryMailRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let owner = make_user("owner", Role::Member, None);
    users.seed(&owner);

    let cipher = cipher();
    let mut integration = MailIntegration::new(owner.id, MailProvider::Zoho, "inbox@example.com");
    integration.status = IntegrationStatus::Connected;
    integration.access_token_enc = Some(cipher.encrypt("live-access").unwrap());
    integration.refresh_token_enc = Some(cipher.encrypt("live-refresh").unwrap());
    integration.key_id = Some(cipher.key_id().to_string());
    integration.token_expires_at = Some(Utc::now() + Duration::hours(1));
    mail.seed(&integration);

    let client = Arc::new(FakeMailClient::new(messages));
    let mut clients: HashMap<MailProvider, Arc<dyn MailProviderClient>> = HashMap::new();
    clients.insert(MailProvider::Zoho, client.clone());

    let sync = Arc::new(MailSyncService::new(mail.clone(), users, clients, cipher));
    Fixture {
        sync,
        mail,
        client,
        owner,
        integration,
    }
}

#[tokio::test]
async fn sync_extracts_and_creates_tasks() {
    let fx = fixture(vec![message(
        "m-1",
        "URGENT: prod database is on fire",
        "Please handle, due by: 2025-11-03.",
    )]);

    let summary = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.created, 1);

    let tasks = fx.mail.tasks.lock().unwrap();
    let task = &tasks[0];
    assert_eq!(task.title, "URGENT: prod database is on fire");
    assert_eq!(task.source, TaskSource::Email);
    assert_eq!(task.priority.as_str(), "urgent");
    assert_eq!(task.creator_id, fx.owner.id);
    assert_eq!(task.confidence_score, Some(0.9));
    assert_eq!(task.metadata["message_id"], "m-1");
    assert_eq!(task.metadata["provider"], "zoho");
    assert!(task.due_date.is_some());
    drop(tasks);

    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    assert_eq!(integration.status, IntegrationStatus::Connected);
    assert!(integration.last_sync_at.is_some());
    assert_eq!(integration.last_sync_message_id.as_deref(), Some("m-1"));
}

#[tokio::test]
async fn second_pass_skips_processed_messages() {
    let fx = fixture(vec![message("m-1", "hello", "body")]);

    let first = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(first.created, 1);

    let second = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);

    assert_eq!(fx.mail.created_task_count(), 1);
    assert_eq!(fx.mail.log_count(), 1);
}

/// S6: two concurrent passes observing the same unread message create
/// exactly one task; the loser of the insert race records a dedup, not
/// a failure.
#[tokio::test]
async fn concurrent_passes_create_at_most_one_task() {
    let fx = fixture(vec![message("m-race", "parallel", "body")]);

    let a = fx.sync.clone();
    let b = fx.sync.clone();
    let id = fx.integration.id;
    let (ra, rb) = tokio::join!(a.sync_integration(id), b.sync_integration(id));

    // Both passes complete; between them exactly one creation.
    let created = ra.map(|s| s.created).unwrap_or(0) + rb.map(|s| s.created).unwrap_or(0);
    assert_eq!(created, 1);
    assert_eq!(fx.mail.created_task_count(), 1);
    assert_eq!(fx.mail.log_count(), 1);
}

#[tokio::test]
async fn low_confidence_is_logged_but_not_created() {
    let mut fx = fixture(vec![message("m-low", "just an update", "nothing actionable")]);
    fx.integration.min_confidence = 0.95;
    fx.mail.seed(&fx.integration);

    let summary = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fx.mail.created_task_count(), 0);

    let logs = fx.mail.logs.lock().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].outcome, ProcessingOutcome::LowConfidence);
}

#[tokio::test]
async fn auto_create_off_records_skips() {
    let mut fx = fixture(vec![message("m-skip", "urgent thing", "body")]);
    fx.integration.auto_create_tasks = false;
    fx.mail.seed(&fx.integration);

    let summary = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(fx.mail.created_task_count(), 0);
    let logs = fx.mail.logs.lock().unwrap();
    assert_eq!(logs[0].outcome, ProcessingOutcome::Skipped);
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_and_persisted() {
    let mut fx = fixture(vec![message("m-1", "hi", "body")]);
    fx.integration.token_expires_at = Some(Utc::now() + Duration::seconds(10));
    fx.mail.seed(&fx.integration);

    fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(fx.client.refresh_calls.load(Ordering::SeqCst), 1);

    // Rotated ciphertext was persisted and still decrypts.
    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    let decrypted = cipher()
        .decrypt(integration.access_token_enc.as_deref().unwrap())
        .unwrap();
    assert_eq!(decrypted, "refreshed-access");
}

#[tokio::test]
async fn refresh_failure_parks_integration_as_expired() {
    let mut fx = fixture(vec![message("m-1", "hi", "body")]);
    fx.integration.token_expires_at = Some(Utc::now() - Duration::seconds(1));
    fx.mail.seed(&fx.integration);
    fx.client.fail_refresh.store(true, Ordering::SeqCst);

    let err = fx.sync.sync_integration(fx.integration.id).await.unwrap_err();
    assert_eq!(err.code(), "REAUTH_REQUIRED");

    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    assert_eq!(integration.status, IntegrationStatus::Expired);
    assert_eq!(fx.mail.created_task_count(), 0);
}

/// A store-level failure while processing a message is transient: no
/// log row is written, the sync window and the incremental cursor stay
/// put, and the message is picked up again on the next pass.
#[tokio::test]
async fn store_failure_during_processing_is_retried_next_pass() {
    let fx = fixture(vec![message("m-flaky", "hello", "body")]);
    fx.mail.fail_writes.store(true, Ordering::SeqCst);

    let err = fx.sync.sync_integration(fx.integration.id).await.unwrap_err();
    assert_eq!(err.code(), "INTERNAL_ERROR");
    assert_eq!(fx.mail.created_task_count(), 0);
    assert_eq!(fx.mail.log_count(), 0);

    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    assert_eq!(integration.status, IntegrationStatus::Error);
    assert_eq!(integration.error_count, 1);
    // Neither the window nor the cursor moved past the failed message.
    assert!(integration.last_sync_at.is_none());
    assert!(integration.last_sync_message_id.is_none());

    // Once the store recovers, the same message is processed.
    fx.mail.fail_writes.store(false, Ordering::SeqCst);
    let mut integration = integration;
    integration.status = IntegrationStatus::Connected;
    fx.mail.seed(&integration);
    let summary = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(fx.mail.log_count(), 1);
    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    assert_eq!(integration.last_sync_message_id.as_deref(), Some("m-flaky"));
}

#[tokio::test]
async fn transient_fetch_error_keeps_sync_window() {
    let fx = fixture(vec![message("m-1", "hi", "body")]);
    fx.client.fail_fetch.store(true, Ordering::SeqCst);

    let err = fx.sync.sync_integration(fx.integration.id).await.unwrap_err();
    assert_eq!(err.code(), "INTERNAL_ERROR");

    let integration = fx
        .mail
        .integrations
        .lock()
        .unwrap()
        .get(&fx.integration.id)
        .cloned()
        .unwrap();
    assert_eq!(integration.status, IntegrationStatus::Error);
    assert_eq!(integration.error_count, 1);
    // last_sync_at untouched so the window is retried next pass.
    assert!(integration.last_sync_at.is_none());

    // The next successful pass picks the message up.
    fx.client.fail_fetch.store(false, Ordering::SeqCst);
    let mut integration = integration;
    integration.status = IntegrationStatus::Connected;
    fx.mail.seed(&integration);
    let summary = fx.sync.sync_integration(fx.integration.id).await.unwrap();
    assert_eq!(summary.created, 1);
}
