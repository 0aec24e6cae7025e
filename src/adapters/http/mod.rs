//! HTTP surface: router, handlers, extractors, response envelope.
//!
//! The handlers are thin: parse, call the service with the verified
//! actor, wrap the result. All behavior lives in the service layer.

pub mod extract;
pub mod handlers;
pub mod responses;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::domain::models::ServerConfig;
use crate::services::{
    AuthService, CommentService, DepartmentService, MailOAuthService, MailSyncService,
    ProjectService, RecurrenceService, StateStore, TaskService, UserService,
};

/// Shared handler state. Everything is an `Arc`; cloning is cheap and
/// the handlers stay stateless.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub tasks: Arc<TaskService>,
    pub users: Arc<UserService>,
    pub projects: Arc<ProjectService>,
    pub departments: Arc<DepartmentService>,
    pub comments: Arc<CommentService>,
    pub mail_oauth: Arc<MailOAuthService>,
    pub mail_sync: Arc<MailSyncService>,
    pub recurrence: Arc<RecurrenceService>,
    pub oauth_states: Arc<StateStore>,
}

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assemble the full router.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let cors = build_cors(server);

    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/keycloak/authorize", get(handlers::auth::keycloak_authorize))
        .route("/auth/keycloak/callback", get(handlers::auth::keycloak_callback))
        // Tasks
        .route("/tasks", get(handlers::tasks::list).post(handlers::tasks::create))
        .route(
            "/tasks/:id",
            get(handlers::tasks::get)
                .put(handlers::tasks::update)
                .patch(handlers::tasks::update)
                .delete(handlers::tasks::delete),
        )
        .route("/tasks/:id/status", axum::routing::patch(handlers::tasks::update_status))
        .route(
            "/tasks/:id/comments",
            get(handlers::tasks::list_comments).post(handlers::tasks::create_comment),
        )
        .route(
            "/tasks/:id/comments/:comment_id",
            axum::routing::delete(handlers::tasks::delete_comment),
        )
        .route("/tasks/:id/attachments", get(handlers::tasks::list_attachments))
        // Projects
        .route(
            "/projects",
            get(handlers::projects::list).post(handlers::projects::create),
        )
        .route(
            "/projects/:id",
            get(handlers::projects::get)
                .put(handlers::projects::update)
                .delete(handlers::projects::delete),
        )
        .route("/projects/:id/tasks", get(handlers::projects::tasks))
        // Users
        .route("/users", get(handlers::users::list))
        .route(
            "/users/:id",
            get(handlers::users::get)
                .put(handlers::users::update)
                .delete(handlers::users::deactivate),
        )
        .route("/users/:id/tasks", get(handlers::users::tasks))
        // Departments
        .route(
            "/departments",
            get(handlers::departments::list).post(handlers::departments::create),
        )
        .route(
            "/departments/:id",
            get(handlers::departments::get)
                .put(handlers::departments::update)
                .delete(handlers::departments::delete),
        )
        .route("/departments/:id/users", get(handlers::departments::users))
        .route("/departments/:id/tasks", get(handlers::departments::tasks))
        // Mail integrations
        .route("/integrations/:provider/auth", post(handlers::integrations::auth))
        .route("/integrations/:provider/callback", get(handlers::integrations::callback))
        .route("/integrations/:provider/status", get(handlers::integrations::status))
        .route("/integrations/:provider/sync", post(handlers::integrations::sync))
        .route(
            "/integrations/:provider/disconnect",
            post(handlers::integrations::disconnect),
        )
        .route("/integrations/:provider/logs", get(handlers::integrations::logs))
        // Recurrence monitoring
        .route("/recurring/runs", get(handlers::recurrence::runs))
        .route("/recurring/:id/runs", get(handlers::recurrence::template_runs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

fn build_cors(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if server.cors_origins.iter().any(|o| o == "*") {
        base.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        base.allow_origin(origins)
    }
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Bind and serve until the shutdown signal flips.
pub async fn serve(
    state: AppState,
    server: &ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");

    let app = router(state, server);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}
