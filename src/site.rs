//! The long-lived service bundle a request renders against.
//!
//! A `Site` is built from a validated `SiteConfig` and never mutated. A
//! config reload builds a new one and swaps it in; the style cache is shared
//! between generations so a reload does not throw compiled styles away.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::assets::{AssetDir, AssetRef};
use crate::config::{Mode, ScriptMode, SiteConfig};
use crate::observability::metrics;
use crate::routing::{LoadPolicy, PatternCache, RouteError, Router};
use crate::styles::{StyleCache, StyleCompiler, StyleError, StyleService, SITE_STYLE_KEY};
use crate::theme::ThemeRoots;

/// Generated file holding the compiled site stylesheet.
pub const SITE_STYLESHEET: &str = "site.css";

/// Errors raised while building a site.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("route table rejected: {}", join_errors(.0))]
    Routes(Vec<RouteError>),

    #[error(transparent)]
    Style(#[from] StyleError),
}

fn join_errors(errors: &[RouteError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// How the site stylesheet reaches the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteStylesheet {
    /// Written to the asset directory.
    Linked(AssetRef),
    /// The file could not be written; emit the CSS inline instead.
    Inline(String),
}

/// Result of an operator purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub entries_removed: usize,
}

#[derive(Debug)]
pub struct Site {
    router: Router,
    roots: ThemeRoots,
    styles: StyleService,
    assets: AssetDir,
    script_mode: ScriptMode,
    mode: Mode,
    site_styles: Vec<PathBuf>,
    live_reload_ms: Option<u64>,
}

impl Site {
    /// Compile routes and wire up the services for `config`.
    pub fn build(
        config: &SiteConfig,
        mode: Mode,
        compiler: Arc<dyn StyleCompiler>,
        cache: StyleCache,
        patterns: &PatternCache,
    ) -> Result<Self, SiteError> {
        let router = Router::from_definitions(config.routes.iter(), patterns, LoadPolicy::from(mode))
            .map_err(SiteError::Routes)?;
        let roots = ThemeRoots::from_config(&config.theme);

        let prelude =
            match StyleService::read_sources(&config.theme.parent_root, &config.styles.prelude) {
                Ok(prelude) => prelude,
                Err(e) if mode.is_debug() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Style prelude unavailable, compiling without it");
                    String::new()
                }
            };

        tracing::info!(
            routes = router.len(),
            mode = mode.as_str(),
            theme = %config.theme.parent_root.display(),
            "Site built"
        );

        Ok(Self {
            router,
            roots,
            styles: StyleService::new(compiler, cache, prelude, mode, config.styles.line_comments),
            assets: AssetDir::from_config(&config.assets),
            script_mode: config.assets.scripts,
            mode,
            site_styles: config.styles.site.clone(),
            live_reload_ms: (mode.is_debug() && config.live_reload.enabled)
                .then_some(config.live_reload.interval_ms),
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn roots(&self) -> &ThemeRoots {
        &self.roots
    }

    pub fn styles(&self) -> &StyleService {
        &self.styles
    }

    pub fn assets(&self) -> &AssetDir {
        &self.assets
    }

    pub fn script_mode(&self) -> ScriptMode {
        self.script_mode
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Poll interval for the browser reload script, when live reload is on.
    pub fn live_reload_interval(&self) -> Option<u64> {
        self.live_reload_ms
    }

    /// Compile the configured site stylesheets and publish `site.css`.
    ///
    /// Returns `None` when no site styles are configured or (in production)
    /// when the sources cannot be read.
    pub fn site_stylesheet(&self) -> Result<Option<SiteStylesheet>, StyleError> {
        if self.site_styles.is_empty() {
            return Ok(None);
        }
        let Some(root) = self.roots.parent_root() else {
            return Ok(None);
        };

        let source = match StyleService::read_sources(root, &self.site_styles) {
            Ok(source) => source,
            Err(e) if self.mode.is_debug() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Site styles unavailable");
                return Ok(None);
            }
        };

        let css = self
            .styles
            .compile(SITE_STYLE_KEY, SITE_STYLESHEET, &source, 1)?;

        match self.assets.write_if_changed(SITE_STYLESHEET, css.as_bytes()) {
            Ok(asset) => Ok(Some(SiteStylesheet::Linked(asset))),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot write site stylesheet, inlining it");
                Ok(Some(SiteStylesheet::Inline(css)))
            }
        }
    }

    /// Drop every compiled style and generated asset. Idempotent.
    ///
    /// Both steps always run; the first failure is returned.
    pub fn purge_style_cache(&self) -> io::Result<PurgeReport> {
        let cache = self.styles.cache().purge();
        let assets = self.assets.purge();
        let entries_removed = cache?;
        assets?;
        metrics::record_purge();
        tracing::info!(entries_removed, "Style cache purged");
        Ok(PurgeReport { entries_removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RouteDefinition, RouteTable};
    use crate::styles::ScssCompiler;
    use std::fs;

    fn config(root: &std::path::Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.theme.parent_root = root.join("theme");
        config.assets.dir = root.join("dist");
        config.styles.cache_path = root.join("cache.json");
        config.routes = RouteTable::from(vec![RouteDefinition::new("home", "/")]);
        config
    }

    fn build(config: &SiteConfig, mode: Mode) -> Result<Site, SiteError> {
        Site::build(
            config,
            mode,
            Arc::new(ScssCompiler),
            StyleCache::load(&config.styles.cache_path),
            &PatternCache::new(),
        )
    }

    #[test]
    fn test_route_errors_depend_on_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.routes.push(RouteDefinition::new("bad", "/:a/:a"));

        assert!(matches!(build(&config, Mode::Debug), Err(SiteError::Routes(e)) if e.len() == 1));
        assert_eq!(build(&config, Mode::Production).unwrap().router().len(), 1);
    }

    #[test]
    fn test_live_reload_only_in_debug() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.live_reload.interval_ms = 250;

        assert_eq!(build(&config, Mode::Debug).unwrap().live_reload_interval(), Some(250));
        assert_eq!(build(&config, Mode::Production).unwrap().live_reload_interval(), None);

        config.live_reload.enabled = false;
        assert_eq!(build(&config, Mode::Debug).unwrap().live_reload_interval(), None);
    }

    #[test]
    fn test_missing_prelude_only_fails_in_debug() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.styles.prelude = vec![PathBuf::from("styles/vars.scss")];

        assert!(matches!(build(&config, Mode::Debug), Err(SiteError::Style(_))));
        assert!(build(&config, Mode::Production).is_ok());
    }

    #[test]
    fn test_site_stylesheet_written_and_purged() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        fs::create_dir_all(tmp.path().join("theme/styles")).unwrap();
        fs::write(tmp.path().join("theme/styles/vars.scss"), "$ink: #111;\n").unwrap();
        fs::write(tmp.path().join("theme/styles/site.scss"), "body { color: $ink; }\n").unwrap();
        config.styles.prelude = vec![PathBuf::from("styles/vars.scss")];
        config.styles.site = vec![PathBuf::from("styles/site.scss")];

        let site = build(&config, Mode::Production).unwrap();
        let Some(SiteStylesheet::Linked(asset)) = site.site_stylesheet().unwrap() else {
            panic!("expected a linked stylesheet");
        };
        assert_eq!(asset.url, "/_pagewright/site.css");
        assert_eq!(
            fs::read_to_string(tmp.path().join("dist/site.css")).unwrap(),
            "body {\n  color: #111;\n}\n"
        );
        assert_eq!(site.styles().cache().len(), 1);

        let report = site.purge_style_cache().unwrap();
        assert_eq!(report.entries_removed, 1);
        assert!(!tmp.path().join("dist").exists());
        assert!(!tmp.path().join("cache.json").exists());
        assert_eq!(site.purge_style_cache().unwrap().entries_removed, 0);
    }

    #[test]
    fn test_purge_clears_assets_when_cache_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        // a directory where the cache file should be cannot be removed as a file
        config.styles.cache_path = tmp.path().join("cache-dir");
        fs::create_dir_all(&config.styles.cache_path).unwrap();
        fs::create_dir_all(tmp.path().join("dist")).unwrap();
        fs::write(tmp.path().join("dist/site.css"), "body {}").unwrap();

        let site = build(&config, Mode::Production).unwrap();
        assert!(site.purge_style_cache().is_err());
        assert!(!tmp.path().join("dist").exists());
    }

    #[test]
    fn test_no_site_styles_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let site = build(&config(tmp.path()), Mode::Production).unwrap();
        assert_eq!(site.site_stylesheet().unwrap(), None);
    }
}
