//! Taskdesk service entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use tokio::sync::watch;

use taskdesk::adapters::http::{self, AppState};
use taskdesk::adapters::mail::{OutlookClient, ZohoClient};
use taskdesk::adapters::oidc::KeycloakProvider;
use taskdesk::adapters::postgres::{
    self, PgAttachmentRepository, PgCommentRepository, PgDepartmentRepository,
    PgMailIntegrationRepository, PgProjectRepository, PgRecurrenceLogRepository,
    PgSessionRepository, PgTaskRepository, PgUserRepository,
};
use taskdesk::domain::models::MailProvider;
use taskdesk::domain::ports::{IdentityProvider, MailProviderClient};
use taskdesk::infrastructure::config::ConfigLoader;
use taskdesk::infrastructure::logging;
use taskdesk::services::{
    AuthService, CommentService, DepartmentService, MailOAuthService, MailPoller,
    MailPollerConfig, MailSyncService, ProjectService, RecurrenceService, StateStore,
    TaskService, TokenCipher, UserService,
};

#[derive(Parser)]
#[command(name = "taskdesk", about = "Multi-tenant task management service")]
struct Cli {
    /// Path to a YAML config file (defaults to ./taskdesk.yaml + env).
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")?;

    logging::init(&config.logging);

    let pool = postgres::create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    postgres::migrate(&pool)
        .await
        .context("Failed to run database migrations")?;

    // Repositories.
    let tasks = Arc::new(PgTaskRepository::new(pool.clone()));
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let departments = Arc::new(PgDepartmentRepository::new(pool.clone()));
    let projects = Arc::new(PgProjectRepository::new(pool.clone()));
    let comments = Arc::new(PgCommentRepository::new(pool.clone()));
    let attachments = Arc::new(PgAttachmentRepository::new(pool.clone()));
    let sessions = Arc::new(PgSessionRepository::new(pool.clone()));
    let integrations = Arc::new(PgMailIntegrationRepository::new(pool.clone()));
    let recurrence_logs = Arc::new(PgRecurrenceLogRepository::new(pool.clone()));

    // External clients.
    let idp: Option<Arc<dyn IdentityProvider>> = if config.oidc.is_configured() {
        Some(Arc::new(KeycloakProvider::new(config.oidc.clone())))
    } else {
        tracing::warn!("OIDC is not configured; federated login disabled");
        None
    };

    let mut mail_clients: HashMap<MailProvider, Arc<dyn MailProviderClient>> = HashMap::new();
    if config.mail.zoho.is_configured() {
        mail_clients.insert(
            MailProvider::Zoho,
            Arc::new(ZohoClient::new(config.mail.zoho.clone())),
        );
    }
    if config.mail.outlook.is_configured() {
        mail_clients.insert(
            MailProvider::Outlook,
            Arc::new(OutlookClient::new(config.mail.outlook.clone())),
        );
    }

    // Services.
    let oauth_states = Arc::new(StateStore::new());
    let auth = Arc::new(AuthService::new(
        users.clone(),
        sessions.clone(),
        idp,
        config.auth.clone(),
    ));
    let task_service = Arc::new(TaskService::new(
        tasks.clone(),
        users.clone(),
        projects.clone(),
        departments.clone(),
    ));
    let user_service = Arc::new(UserService::new(
        users.clone(),
        departments.clone(),
        sessions.clone(),
    ));
    let project_service = Arc::new(ProjectService::new(
        projects.clone(),
        departments.clone(),
        users.clone(),
        tasks.clone(),
    ));
    let department_service = Arc::new(DepartmentService::new(
        departments.clone(),
        users.clone(),
        tasks.clone(),
    ));
    let comment_service = Arc::new(CommentService::new(
        comments,
        attachments,
        tasks.clone(),
    ));
    let recurrence_service = Arc::new(RecurrenceService::new(recurrence_logs));

    let mail_enabled = !mail_clients.is_empty();
    let cipher = if mail_enabled {
        TokenCipher::from_config(&config.mail).context("Failed to build mail token cipher")?
    } else {
        // No provider is wired, so this key never seals anything.
        TokenCipher::new(&BASE64.encode([0u8; 32]), "disabled")?
    };
    let mail_oauth = Arc::new(MailOAuthService::new(
        integrations.clone(),
        mail_clients.clone(),
        cipher.clone(),
        oauth_states.clone(),
    ));
    let mail_sync = Arc::new(MailSyncService::new(
        integrations.clone(),
        users.clone(),
        mail_clients,
        cipher,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Mail poller daemon.
    let mut poller_handle = None;
    if mail_enabled {
        let poller = MailPoller::new(
            integrations.clone(),
            mail_sync.clone(),
            MailPollerConfig {
                interval: Duration::from_secs(config.mail.poll_interval_secs),
                max_concurrent: config.mail.max_concurrent_syncs,
                run_on_startup: true,
            },
        );
        poller_handle = Some(tokio::spawn(poller.run(shutdown_rx.clone())));
    } else {
        tracing::info!("no mail provider configured; poller not started");
    }

    let state = AppState {
        auth,
        tasks: task_service,
        users: user_service,
        projects: project_service,
        departments: department_service,
        comments: comment_service,
        mail_oauth,
        mail_sync,
        recurrence: recurrence_service,
        oauth_states,
    };

    // Serve until SIGTERM / ctrl-c.
    let server_config = config.server.clone();
    let serve_handle = tokio::spawn(async move {
        http::serve(state, &server_config, shutdown_rx).await
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    serve_handle.await??;
    if let Some(handle) = poller_handle {
        let _ = handle.await;
    }
    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
