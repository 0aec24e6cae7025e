//! Mail polling daemon.
//!
//! A single cooperative loop: each pass loads the syncable
//! integrations, honors each one's own polling interval, and fans out
//! under a concurrency cap to avoid provider throttling. Cancellation
//! lands between integrations, never mid-integration.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::models::MailIntegration;
use crate::domain::ports::MailIntegrationRepository;
use crate::services::mail_sync_service::MailSyncService;

/// Configuration for the poller loop.
#[derive(Debug, Clone)]
pub struct MailPollerConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Cap on concurrent per-integration syncs within one pass.
    pub max_concurrent: usize,
    /// Whether to run a pass immediately at startup.
    pub run_on_startup: bool,
}

impl Default for MailPollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_concurrent: 8,
            run_on_startup: true,
        }
    }
}

/// Counters for one poller pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub synced: usize,
    pub errors: usize,
}

pub struct MailPoller {
    integrations: Arc<dyn MailIntegrationRepository>,
    sync: Arc<MailSyncService>,
    config: MailPollerConfig,
}

impl MailPoller {
    pub fn new(
        integrations: Arc<dyn MailIntegrationRepository>,
        sync: Arc<MailSyncService>,
        config: MailPollerConfig,
    ) -> Self {
        Self {
            integrations,
            sync,
            config,
        }
    }

    /// Run until the shutdown signal flips. One pass at a time.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.run_on_startup {
            // Consume the immediate first tick.
            ticker.tick().await;
        }
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "mail poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.run_pass().await;
                    if summary.synced > 0 || summary.errors > 0 {
                        tracing::info!(
                            synced = summary.synced,
                            errors = summary.errors,
                            "mail poller pass complete"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("mail poller shutting down");
                    break;
                }
            }
        }
    }

    /// One pass over all due integrations.
    pub async fn run_pass(&self) -> PassSummary {
        let integrations = match self.integrations.list_syncable().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err, "failed to load syncable integrations");
                return PassSummary {
                    synced: 0,
                    errors: 1,
                };
            }
        };

        let due: Vec<MailIntegration> =
            integrations.into_iter().filter(is_due).collect();
        if due.is_empty() {
            return PassSummary::default();
        }

        let results = stream::iter(due)
            .map(|integration| {
                let sync = Arc::clone(&self.sync);
                async move {
                    let id = integration.id;
                    match sync.sync_integration(id).await {
                        Ok(_) => true,
                        Err(err) => {
                            tracing::warn!(
                                integration_id = %id,
                                error = %err,
                                "integration sync failed"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect::<Vec<bool>>()
            .await;

        PassSummary {
            synced: results.iter().filter(|ok| **ok).count(),
            errors: results.iter().filter(|ok| !**ok).count(),
        }
    }
}

/// An integration is due when its own polling interval has elapsed
/// since the last successful sync.
fn is_due(integration: &MailIntegration) -> bool {
    match integration.last_sync_at {
        None => true,
        Some(last) => {
            let elapsed = Utc::now() - last;
            elapsed.num_minutes() >= i64::from(integration.poll_interval_minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MailProvider;
    use uuid::Uuid;

    #[test]
    fn never_synced_integration_is_due() {
        let integration =
            MailIntegration::new(Uuid::new_v4(), MailProvider::Zoho, "a@b.c");
        assert!(is_due(&integration));
    }

    #[test]
    fn recently_synced_integration_is_not_due() {
        let mut integration =
            MailIntegration::new(Uuid::new_v4(), MailProvider::Zoho, "a@b.c");
        integration.poll_interval_minutes = 5;
        integration.last_sync_at = Some(Utc::now() - chrono::Duration::minutes(2));
        assert!(!is_due(&integration));

        integration.last_sync_at = Some(Utc::now() - chrono::Duration::minutes(6));
        assert!(is_due(&integration));
    }
}
