//! Debug/production mode.
//!
//! Read once from the environment at process start and carried on the
//! site from then on.

use serde::Serialize;

/// Environment variable that switches debug mode on.
pub const DEBUG_ENV: &str = "PAGEWRIGHT_DEBUG";

/// Process-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Degrade gracefully: skip bad routes, fall back to raw styles.
    #[default]
    Production,
    /// Fail loudly: surface configuration and compile errors immediately.
    Debug,
}

impl Mode {
    /// Read `PAGEWRIGHT_DEBUG` from the environment.
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(DEBUG_ENV).ok().as_deref())
    }

    /// Interpret a raw flag value (`1`, `true`, `yes`, `on` mean debug).
    pub fn from_flag(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Mode::Debug,
            _ => Mode::Production,
        }
    }

    pub fn is_debug(self) -> bool {
        self == Mode::Debug
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Debug => "debug",
        }
    }
}
