//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the site.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Root configuration for a pagewright site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Theme roots searched for templates, layouts and components.
    pub theme: ThemeConfig,

    /// Route declarations, in match order.
    pub routes: RouteTable,

    /// Style compilation settings.
    pub styles: StylesConfig,

    /// Generated asset output.
    pub assets: AssetsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Browser reload on theme changes (debug mode only).
    pub live_reload: LiveReloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight page renders.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 1_024,
        }
    }
}

/// Theme directory layout.
///
/// Roots are searched child first, then parent, then the optional
/// compatibility fallback.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Override root (a child theme).
    pub child_root: Option<PathBuf>,

    /// Base theme root.
    pub parent_root: PathBuf,

    /// Compatibility fallback root.
    pub fallback_root: Option<PathBuf>,

    /// File extension for template files, without the dot.
    pub extension: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            child_root: None,
            parent_root: PathBuf::from("theme"),
            fallback_root: None,
            extension: "html".to_string(),
        }
    }
}

/// A single route declaration as written in the config file.
///
/// `path` stays optional here so that a record without one is reported by
/// validation as an invalid route instead of failing the whole parse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDefinition {
    /// Route name, unique within the table.
    pub name: String,

    /// Path pattern (e.g. `/work/:spot/`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Template name. Defaults to the route name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Layout name. Defaults to `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

impl RouteDefinition {
    /// Shorthand for a route whose template is its own name.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            template: None,
            layout: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }
}

/// Value side of a `name = ...` entry in the routes table.
#[derive(Deserialize)]
#[serde(untagged)]
enum RouteEntry {
    Path(String),
    Record(RouteRecord),
}

#[derive(Deserialize)]
struct RouteRecord {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    layout: Option<String>,
}

impl RouteEntry {
    fn into_definition(self, name: String) -> RouteDefinition {
        match self {
            RouteEntry::Path(path) => RouteDefinition::new(name, path),
            RouteEntry::Record(record) => RouteDefinition {
                name,
                path: record.path,
                template: record.template,
                layout: record.layout,
            },
        }
    }
}

/// Ordered route declarations.
///
/// Accepts either a table keyed by route name (values are a path string or a
/// `{ path, template, layout }` record) or an array of records carrying their
/// own `name`. Declaration order is kept in both forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable(pub Vec<RouteDefinition>);

impl RouteTable {
    pub fn iter(&self) -> std::slice::Iter<'_, RouteDefinition> {
        self.0.iter()
    }

    pub fn push(&mut self, definition: RouteDefinition) {
        self.0.push(definition);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<RouteDefinition>> for RouteTable {
    fn from(routes: Vec<RouteDefinition>) -> Self {
        Self(routes)
    }
}

impl<'de> Deserialize<'de> for RouteTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RouteTableVisitor;

        impl<'de> Visitor<'de> for RouteTableVisitor {
            type Value = RouteTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of routes or an array of route records")
            }

            fn visit_map<A>(self, mut map: A) -> Result<RouteTable, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut routes = Vec::new();
                while let Some((name, entry)) = map.next_entry::<String, RouteEntry>()? {
                    routes.push(entry.into_definition(name));
                }
                Ok(RouteTable(routes))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<RouteTable, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut routes = Vec::new();
                while let Some(definition) = seq.next_element::<RouteDefinition>()? {
                    routes.push(definition);
                }
                Ok(RouteTable(routes))
            }
        }

        deserializer.deserialize_any(RouteTableVisitor)
    }
}

impl Serialize for RouteTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Style compilation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Shared files (variables, mixins) prepended to every compiled style,
    /// relative to the parent theme root.
    pub prelude: Vec<PathBuf>,

    /// Site-wide stylesheets compiled into `site.css`, relative to the
    /// parent theme root.
    pub site: Vec<PathBuf>,

    /// Durable compiled-style cache file.
    pub cache_path: PathBuf,

    /// Emit `/* line N, file */` comments in debug mode.
    pub line_comments: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            prelude: Vec::new(),
            site: Vec::new(),
            cache_path: PathBuf::from(".pagewright/style-cache.json"),
            line_comments: true,
        }
    }
}

/// How aggregated component scripts reach the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMode {
    /// One inline `<script>` block at the scripts outlet.
    #[default]
    Inline,
    /// One generated file per component under the asset directory.
    File,
}

/// Generated asset directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Filesystem directory, created on demand.
    pub dir: PathBuf,

    /// URL prefix the directory is served under.
    pub url_prefix: String,

    /// Script emission mode.
    pub scripts: ScriptMode,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".pagewright/dist"),
            url_prefix: "/_pagewright".to_string(),
            scripts: ScriptMode::Inline,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Live reload settings. Only honored in debug mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    pub enabled: bool,

    /// How often the injected script polls for changes, in milliseconds.
    pub interval_ms: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder admin key; validation refuses it when admin is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_table_keeps_declaration_order() {
        let config: SiteConfig = toml::from_str(
            r#"
            [routes]
            home = "/"
            work = "/work/"
            work-detail = { path = "/work/:spot/", layout = "layout1" }
            reel = "/reel/"
            "#,
        )
        .unwrap();

        let names: Vec<_> = config.routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["home", "work", "work-detail", "reel"]);

        let detail = &config.routes.0[2];
        assert_eq!(detail.path.as_deref(), Some("/work/:spot/"));
        assert_eq!(detail.layout.as_deref(), Some("layout1"));
        assert_eq!(detail.template, None);
    }

    #[test]
    fn test_routes_array_form() {
        let config: SiteConfig = toml::from_str(
            r#"
            [[routes]]
            name = "work"
            path = "/work/"

            [[routes]]
            name = "work-detail"
            path = "/work/:spot/"
            template = "detail"
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes.0[1].template.as_deref(), Some("detail"));
    }

    #[test]
    fn test_record_without_path_still_parses() {
        let config: SiteConfig = toml::from_str(
            r#"
            [routes]
            broken = { template = "x" }
            "#,
        )
        .unwrap();

        assert_eq!(config.routes.0[0].path, None);
    }

    #[test]
    fn test_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.theme.extension, "html");
        assert_eq!(config.assets.scripts, ScriptMode::Inline);
        assert!(config.routes.is_empty());
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_script_mode_lowercase() {
        let config: SiteConfig = toml::from_str(
            r#"
            [assets]
            scripts = "file"
            "#,
        )
        .unwrap();
        assert_eq!(config.assets.scripts, ScriptMode::File);
    }
}
