//! Theme file watcher for debug-mode live reload.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::SiteConfig;

/// Directory names never watched.
const IGNORED_DIRS: &[&str] = &["images", "vendor", "node_modules"];

/// Monotonic marker of the last theme change, shared with the HTTP layer.
#[derive(Debug, Clone)]
pub struct ChangeStamp(Arc<AtomicU64>);

impl ChangeStamp {
    /// Starts at the current time so a restarted server reads as a change.
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(now_millis())))
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Advance the stamp; always strictly increases.
    pub fn bump(&self) -> u64 {
        let now = now_millis();
        let previous = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(previous + 1)
    }
}

impl Default for ChangeStamp {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Which paths count as theme changes.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    excluded: Vec<PathBuf>,
}

impl ChangeFilter {
    /// Theme markup plus scripts and styles, minus generated output.
    pub fn from_config(config: &SiteConfig) -> Self {
        let mut extensions = vec!["js".to_string(), "css".to_string(), "scss".to_string()];
        let markup = config.theme.extension.trim_start_matches('.').to_ascii_lowercase();
        if !extensions.contains(&markup) {
            extensions.push(markup);
        }

        Self {
            roots: with_canonical(theme_roots(config)),
            extensions,
            excluded: with_canonical(vec![
                config.assets.dir.clone(),
                config.styles.cache_path.clone(),
            ]),
        }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return false;
        }
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        // only directories inside the theme count, not where the theme lives
        let inside = self
            .roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or_else(|| Path::new(path.file_name().unwrap_or_default()));
        !inside.components().any(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|n| n.starts_with('.') || IGNORED_DIRS.contains(&n)),
            _ => false,
        })
    }
}

/// Child, parent and fallback roots, in lookup order.
fn theme_roots(config: &SiteConfig) -> Vec<PathBuf> {
    let theme = &config.theme;
    theme
        .child_root
        .iter()
        .chain(std::iter::once(&theme.parent_root))
        .chain(theme.fallback_root.iter())
        .cloned()
        .collect()
}

fn with_canonical(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    for path in paths.clone() {
        if let Ok(canonical) = path.canonicalize() {
            if canonical != path {
                paths.push(canonical);
            }
        }
    }
    paths
}

/// Watches every theme root and bumps a [`ChangeStamp`] on relevant edits.
pub struct ThemeWatcher {
    roots: Vec<PathBuf>,
    filter: ChangeFilter,
    stamp: ChangeStamp,
}

impl ThemeWatcher {
    pub fn new(config: &SiteConfig, stamp: ChangeStamp) -> Self {
        Self {
            roots: theme_roots(config),
            filter: ChangeFilter::from_config(config),
            stamp,
        }
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as changes are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let filter = self.filter.clone();
        let stamp = self.stamp.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let changed = event.kind.is_modify()
                        || event.kind.is_create()
                        || event.kind.is_remove();
                    if changed && event.paths.iter().any(|p| filter.is_relevant(p)) {
                        let stamp = stamp.bump();
                        tracing::debug!(paths = ?event.paths, stamp, "Theme change detected");
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        for root in &self.roots {
            if !root.is_dir() {
                tracing::warn!(root = %root.display(), "Theme root missing, not watched");
                continue;
            }
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        tracing::info!(roots = ?self.roots, "Theme watcher started");
        Ok(watcher)
    }
}
