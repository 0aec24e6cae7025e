//! Service configuration structures.
//!
//! Built once at startup by the figment loader and threaded into each
//! component's constructor; read-only thereafter.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the taskdesk service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub oidc: OidcConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            oidc: OidcConfig::default(),
            mail: MailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP bind and CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Pool cap. Matches the transaction-pooling proxy's per-service limit.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    "postgres://localhost/taskdesk".to_string()
}

const fn default_max_connections() -> u32 {
    25
}

const fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    /// HMAC signing key for access and refresh tokens.
    #[serde(default)]
    pub signing_key: String,

    #[serde(default = "default_access_ttl_hours")]
    pub access_ttl_hours: i64,

    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,

    #[serde(default = "default_issuer")]
    pub issuer: String,
}

const fn default_access_ttl_hours() -> i64 {
    24
}

const fn default_refresh_ttl_days() -> i64 {
    7
}

fn default_issuer() -> String {
    "taskdesk".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            access_ttl_hours: default_access_ttl_hours(),
            refresh_ttl_days: default_refresh_ttl_days(),
            issuer: default_issuer(),
        }
    }
}

/// Federated identity provider (Keycloak) settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OidcConfig {
    /// Issuer base URL, e.g. `https://sso.example.com/realms/main`.
    #[serde(default)]
    pub issuer_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Redirect URL registered with the IdP for the callback endpoint.
    #[serde(default)]
    pub redirect_url: String,
}

impl OidcConfig {
    pub fn is_configured(&self) -> bool {
        !self.issuer_url.is_empty() && !self.client_id.is_empty()
    }
}

/// Per-provider OAuth application credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MailProviderConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub redirect_url: String,
}

impl MailProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Mail integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MailConfig {
    /// Base64-encoded 32-byte AES-256 key for at-rest token encryption.
    #[serde(default)]
    pub encryption_key: String,

    /// Identifier stored alongside sealed tokens, for key rotation.
    #[serde(default = "default_key_id")]
    pub encryption_key_id: String,

    /// Seconds between poller passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Cap on concurrent per-integration syncs within one pass.
    #[serde(default = "default_max_concurrent_syncs")]
    pub max_concurrent_syncs: usize,

    #[serde(default)]
    pub zoho: MailProviderConfig,

    #[serde(default)]
    pub outlook: MailProviderConfig,
}

fn default_key_id() -> String {
    "k1".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    300
}

const fn default_max_concurrent_syncs() -> usize {
    8
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            encryption_key_id: default_key_id(),
            poll_interval_secs: default_poll_interval_secs(),
            max_concurrent_syncs: default_max_concurrent_syncs(),
            zoho: MailProviderConfig::default(),
            outlook: MailProviderConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
