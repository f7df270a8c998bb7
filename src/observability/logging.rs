//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - `RUST_LOG` wins; otherwise the configured level applies to this crate
//!   and tower_http

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor a config level is given.
pub const DEFAULT_FILTER: &str = "pagewright=debug,tower_http=debug";

/// Build the filter for `log_level` (`info`, `debug`, ...).
pub fn env_filter(log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match log_level {
        Some(level) if !level.trim().is_empty() => {
            EnvFilter::new(format!("pagewright={level},tower_http={level}", level = level.trim()))
        }
        _ => EnvFilter::new(DEFAULT_FILTER),
    })
}

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(log_level: Option<&str>) {
    let result = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        eprintln!("logging already initialised: {e}");
    }
}
