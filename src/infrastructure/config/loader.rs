use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::AppConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("auth.signing_key must be set and at least 32 characters")]
    WeakSigningKey,

    #[error("mail.encryption_key must be base64 for exactly 32 bytes when a mail provider is configured")]
    InvalidEncryptionKey,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database.url cannot be empty")]
    EmptyDatabaseUrl,

    #[error("database.max_connections must be at least 1")]
    InvalidMaxConnections,

    #[error("mail.poll_interval_secs must be at least 30")]
    PollIntervalTooShort,

    #[error("mail.max_concurrent_syncs must be between 1 and 64")]
    InvalidConcurrency,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. taskdesk.yaml in the working directory
    /// 3. Environment variables (TASKDESK_* prefix, highest priority)
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file("taskdesk.yaml"))
            .merge(Env::prefixed("TASKDESK_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("TASKDESK_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }
        if config.auth.signing_key.len() < 32 {
            return Err(ConfigError::WeakSigningKey);
        }

        let mail_in_use = config.mail.zoho.is_configured() || config.mail.outlook.is_configured();
        if mail_in_use {
            let decoded = BASE64
                .decode(config.mail.encryption_key.trim())
                .map_err(|_| ConfigError::InvalidEncryptionKey)?;
            if decoded.len() != 32 {
                return Err(ConfigError::InvalidEncryptionKey);
            }
        }
        if config.mail.poll_interval_secs < 30 {
            return Err(ConfigError::PollIntervalTooShort);
        }
        if config.mail.max_concurrent_syncs == 0 || config.mail.max_concurrent_syncs > 64 {
            return Err(ConfigError::InvalidConcurrency);
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.signing_key = "0123456789abcdef0123456789abcdef".into();
        config
    }

    #[test]
    fn defaults_with_signing_key_validate() {
        assert!(ConfigLoader::validate(&valid_config()).is_ok());
    }

    #[test]
    fn short_signing_key_is_rejected() {
        let mut config = valid_config();
        config.auth.signing_key = "short".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::WeakSigningKey)
        ));
    }

    #[test]
    fn mail_provider_requires_well_formed_encryption_key() {
        let mut config = valid_config();
        config.mail.zoho.client_id = "id".into();
        config.mail.zoho.client_secret = "secret".into();
        config.mail.encryption_key = "not-base64!!".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidEncryptionKey)
        ));

        config.mail.encryption_key = BASE64.encode([0u8; 32]);
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = valid_config();
        config.logging.level = "loud".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskdesk.yaml");
        std::fs::write(
            &path,
            "server:\n  port: 9999\nauth:\n  signing_key: 0123456789abcdef0123456789abcdef\n",
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 9999);
        // Untouched sections keep their defaults.
        assert_eq!(config.database.max_connections, 25);
    }
}
