//! Tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::models::LoggingConfig;

/// Initialize the global subscriber. `RUST_LOG` wins over the
/// configured level when set.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.format == "json" {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}
