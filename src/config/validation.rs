//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Route integrity: every entry has a path, names are unique, patterns compile
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SiteConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{SiteConfig, PLACEHOLDER_API_KEY};
use crate::routing::pattern::CompiledPattern;
use crate::routing::router::{Route, RouteError};

/// A single semantic problem with a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Route(#[from] RouteError),

    #[error("theme.parent_root must not be empty")]
    EmptyParentRoot,

    #[error("theme.extension must not be empty")]
    EmptyExtension,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("live_reload.interval_ms must be greater than zero")]
    ZeroReloadInterval,

    #[error("admin is enabled with the placeholder api_key")]
    PlaceholderApiKey,
}

impl ValidationError {
    /// Route errors are the only ones production mode may tolerate.
    pub fn is_route_error(&self) -> bool {
        matches!(self, ValidationError::Route(_))
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &SiteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.theme.parent_root.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyParentRoot);
    }
    if config.theme.extension.trim().is_empty() {
        errors.push(ValidationError::EmptyExtension);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.live_reload.enabled && config.live_reload.interval_ms == 0 {
        errors.push(ValidationError::ZeroReloadInterval);
    }
    if config.admin.enabled && config.admin.api_key == PLACEHOLDER_API_KEY {
        errors.push(ValidationError::PlaceholderApiKey);
    }

    let mut seen = HashSet::new();
    for definition in config.routes.iter() {
        if !seen.insert(definition.name.as_str()) {
            errors.push(RouteError::DuplicateName(definition.name.clone()).into());
            continue;
        }
        match Route::from_definition(definition) {
            Ok(route) => {
                if let Err(e) = CompiledPattern::compile(&route.path) {
                    errors.push(RouteError::from(e).into());
                }
            }
            Err(e) => errors.push(e.into()),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
