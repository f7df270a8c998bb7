//! Cached style compilation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Mode;
use crate::observability::metrics;
use crate::styles::cache::{StyleCache, StyleCacheEntry};
use crate::styles::compiler::{checksum, CompileOptions, StyleCompiler, StyleError};

/// Cache key of the site-wide stylesheet.
pub const SITE_STYLE_KEY: &str = "site";

/// Long-lived compile service shared by every request.
#[derive(Debug, Clone)]
pub struct StyleService {
    compiler: Arc<dyn StyleCompiler>,
    cache: StyleCache,
    prelude: String,
    mode: Mode,
    line_comments: bool,
}

impl StyleService {
    pub fn new(
        compiler: Arc<dyn StyleCompiler>,
        cache: StyleCache,
        prelude: impl Into<String>,
        mode: Mode,
        line_comments: bool,
    ) -> Self {
        Self {
            compiler,
            cache,
            prelude: prelude.into(),
            mode,
            line_comments,
        }
    }

    /// Concatenate style files found under `root`.
    pub fn read_sources(root: &Path, files: &[PathBuf]) -> Result<String, StyleError> {
        let mut out = String::new();
        for file in files {
            let path = root.join(file);
            let text = fs::read_to_string(&path).map_err(|source| StyleError::Read {
                path: path.clone(),
                source,
            })?;
            out.push_str(&text);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Compile one style block, consulting the cache first.
    ///
    /// `first_line` is the 1-based line the block starts on in its source
    /// file. In debug mode the input is padded so compiled line numbers
    /// line up with it.
    ///
    /// On a compile error production mode logs and returns `body`
    /// unchanged (uncached); debug mode returns the error.
    pub fn compile(
        &self,
        source_key: &str,
        source_name: &str,
        body: &str,
        first_line: usize,
    ) -> Result<String, StyleError> {
        let body = if self.mode.is_debug() {
            self.pad_body(body, first_line)
        } else {
            body.to_string()
        };
        let sum = checksum(&self.prelude, &body, self.mode);

        if let Some(css) = self.cache.get_valid(source_key, &sum) {
            metrics::record_style_cache(true);
            tracing::debug!(source = %source_key, "Style cache hit");
            return Ok(css);
        }
        metrics::record_style_cache(false);

        let mut input = String::with_capacity(self.prelude.len() + body.len() + 1);
        input.push_str(&self.prelude);
        if !input.is_empty() && !input.ends_with('\n') {
            input.push('\n');
        }
        input.push_str(&body);

        let options = CompileOptions {
            line_comments: self.mode.is_debug() && self.line_comments,
            source_name: source_name.to_string(),
        };

        match self.compiler.compile(&input, &options) {
            Ok(css) => {
                tracing::debug!(source = %source_key, bytes = css.len(), "Style compiled");
                self.cache.insert(StyleCacheEntry {
                    source_key: source_key.to_string(),
                    compiled_css: css.clone(),
                    checksum: sum,
                });
                Ok(css)
            }
            Err(e) if self.mode.is_debug() => Err(e),
            Err(e) => {
                tracing::warn!(source = %source_key, error = %e, "Style compile failed, emitting raw source");
                Ok(body.trim().to_string())
            }
        }
    }

    /// Prefix `body` with blank lines so that, after the prelude, its first
    /// line lands on `first_line`.
    fn pad_body(&self, body: &str, first_line: usize) -> String {
        let prelude_lines = if self.prelude.is_empty() {
            0
        } else {
            self.prelude.lines().count()
        };
        let padding = first_line.saturating_sub(1).saturating_sub(prelude_lines);
        let mut out = String::with_capacity(padding + body.len());
        for _ in 0..padding {
            out.push('\n');
        }
        out.push_str(body);
        out
    }

    pub fn cache(&self) -> &StyleCache {
        &self.cache
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::compiler::ScssCompiler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl StyleCompiler for Counting {
        fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, StyleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ScssCompiler.compile(source, options)
        }
    }

    fn service(mode: Mode) -> (StyleService, Arc<Counting>) {
        let spy = Arc::new(Counting::default());
        let svc = StyleService::new(
            spy.clone(),
            StyleCache::new(None),
            "$accent: red;",
            mode,
            true,
        );
        (svc, spy)
    }

    #[test]
    fn test_second_compile_is_a_cache_hit() {
        let (svc, spy) = service(Mode::Production);
        let a = svc.compile("c.html", "c.html", ".a { color: $accent; }", 1).unwrap();
        let b = svc.compile("c.html", "c.html", ".a { color: $accent; }", 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ".a {\n  color: red;\n}\n");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_changed_source_recompiles_and_reverts() {
        let (svc, spy) = service(Mode::Production);
        let original = svc.compile("c.html", "c.html", ".a { x: 1; }", 1).unwrap();
        let changed = svc.compile("c.html", "c.html", ".a { x: 2; }", 1).unwrap();
        assert_ne!(original, changed);
        let reverted = svc.compile("c.html", "c.html", ".a { x: 1; }", 1).unwrap();
        assert_eq!(original, reverted);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_production_falls_back_to_raw_text() {
        let (svc, spy) = service(Mode::Production);
        let raw = ".a { color: $nope; }";
        assert_eq!(svc.compile("c.html", "c.html", raw, 1).unwrap(), raw);
        assert!(svc.cache().is_empty());
        svc.compile("c.html", "c.html", raw, 1).unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_propagates_errors() {
        let (svc, _) = service(Mode::Debug);
        let err = svc.compile("c.html", "c.html", ".a { color: $nope; }", 1);
        assert!(matches!(err, Err(StyleError::Compilation { .. })));
    }

    #[test]
    fn test_debug_line_comments_follow_source_lines() {
        let (svc, _) = service(Mode::Debug);
        let css = svc.compile("c.html", "components/c.html", ".a { x: 1; }", 5).unwrap();
        assert_eq!(css, "/* line 5, components/c.html */\n.a {\n  x: 1;\n}\n");
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let cache = StyleCache::new(None);
        let spy = Arc::new(Counting::default());
        let prod = StyleService::new(spy.clone(), cache.clone(), "", Mode::Production, false);
        let debug = StyleService::new(spy.clone(), cache, "", Mode::Debug, false);

        prod.compile("k", "k", ".a { x: 1; }", 1).unwrap();
        debug.compile("k", "k", ".a { x: 1; }", 1).unwrap();
        prod.compile("k", "k", ".a { x: 1; }", 1).unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_read_sources_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("vars.scss"), "$a: 1px;").unwrap();
        let text =
            StyleService::read_sources(tmp.path(), &[PathBuf::from("vars.scss")]).unwrap();
        assert_eq!(text, "$a: 1px;\n");

        let err = StyleService::read_sources(tmp.path(), &[PathBuf::from("nope.scss")]);
        assert!(matches!(err, Err(StyleError::Read { .. })));
    }
}
