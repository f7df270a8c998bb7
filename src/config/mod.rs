//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, route integrity)
//!     → SiteConfig (validated, immutable)
//!     → Site::build (compiled routes, theme roots, style service)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new Site built and swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Debug/production mode comes from the environment, not the file

pub mod loader;
pub mod mode;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use mode::Mode;
pub use schema::{
    AdminConfig, AssetsConfig, ListenerConfig, LiveReloadConfig, ObservabilityConfig, RouteDefinition, RouteTable,
    ScriptMode, SiteConfig, StylesConfig, ThemeConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
