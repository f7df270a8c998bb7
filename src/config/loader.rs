//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::mode::Mode;
use crate::config::schema::SiteConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Route errors are fatal in debug mode. In production they are logged and
/// the offending entries are skipped later when the router is built.
pub fn load_config(path: &Path, mode: Mode) -> Result<SiteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, mode)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, mode: Mode) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    if let Err(errors) = validate_config(&config) {
        let (route_errors, fatal): (Vec<_>, Vec<_>) =
            errors.into_iter().partition(ValidationError::is_route_error);

        if !fatal.is_empty() || (mode.is_debug() && !route_errors.is_empty()) {
            let mut all = fatal;
            if mode.is_debug() {
                all.extend(route_errors);
            }
            return Err(ConfigError::Validation(all));
        }

        for err in &route_errors {
            tracing::warn!(error = %err, "Skipping invalid route declaration");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN_ROUTES: &str = r#"
        [routes]
        home = "/"
        broken = { template = "x" }
    "#;

    #[test]
    fn test_invalid_route_fails_in_debug() {
        let err = parse_config(BROKEN_ROUTES, Mode::Debug).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errs) if errs.len() == 1));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_invalid_route_tolerated_in_production() {
        let config = parse_config(BROKEN_ROUTES, Mode::Production).unwrap();
        assert_eq!(config.routes.len(), 2);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("routes = 3", Mode::Production).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml"), Mode::Production).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
