//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pagewright::config::{Mode, RouteDefinition, RouteTable, SiteConfig};
use pagewright::routing::PatternCache;
use pagewright::styles::{CompileOptions, ScssCompiler, StyleCache, StyleCompiler, StyleError};
use pagewright::Site;
use tempfile::TempDir;

pub const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>{{ route.name }}</title>
{{ styles() }}
</head>
<body class="{{ body_class }}">
{{ outlet() }}
{{ scripts() }}
</body>
</html>
"#;

pub const LAYOUT1: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>Work</title>
{{ styles() }}
</head>
<body class="{{ body_class }}">
<main class="layout1">
{{ outlet() }}
</main>
{{ scripts() }}
</body>
</html>
"#;

pub const WORK_BLOCK: &str = r#"<template>
  <article class="work-block">
    <h2>{{ title }}</h2>
  </article>
</template>
<style>
$accent: #c33;
.work-block {
  h2 { color: $accent; }
}
</style>
<script>
document.querySelectorAll('.work-block').forEach(function (el) { el.dataset.ready = '1'; });
</script>
"#;

pub const WORK_TEMPLATE: &str = r#"<section class="work">
{{ component(name="work-block", title="Alpha") }}
{{ component(name="work-block", title="Beta") }}
{{ component(name="work-block", title="Gamma") }}
{{ component(name="work-block", title="Delta") }}
</section>
"#;

/// A theme on disk with a small route table.
pub struct ThemeFixture {
    pub dir: TempDir,
}

impl ThemeFixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fixture.write("theme/layouts/default.html", DEFAULT_LAYOUT);
        fixture.write("theme/layouts/layout1.html", LAYOUT1);
        fixture.write("theme/templates/home.html", "<h1>Home</h1>\n");
        fixture.write("theme/templates/work.html", WORK_TEMPLATE);
        fixture.write(
            "theme/templates/project.html",
            "<h1>Project {{ route.params.slug }}</h1>\n",
        );
        fixture.write("theme/components/work-block.html", WORK_BLOCK);
        fixture.write("outside.html", "<p>secret</p>\n");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn config(&self) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.theme.parent_root = self.path("theme");
        config.assets.dir = self.path("dist");
        config.styles.cache_path = self.path("cache/styles.json");
        config.routes = RouteTable::from(vec![
            RouteDefinition::new("home", "/"),
            RouteDefinition::new("work", "/work/").with_layout("layout1"),
            RouteDefinition::new("project", "/work/:slug"),
            RouteDefinition::new("ghost", "/ghost"),
            RouteDefinition::new("nolayout", "/nolayout")
                .with_template("home")
                .with_layout("missing"),
            RouteDefinition::new("escape", "/escape").with_template("../../outside"),
        ]);
        config
    }

    pub fn site(&self, mode: Mode) -> Arc<Site> {
        self.site_with(&self.config(), mode, Arc::new(ScssCompiler))
    }

    pub fn site_with(
        &self,
        config: &SiteConfig,
        mode: Mode,
        compiler: Arc<dyn StyleCompiler>,
    ) -> Arc<Site> {
        let cache = StyleCache::load(&config.styles.cache_path);
        Arc::new(Site::build(config, mode, compiler, cache, &PatternCache::new()).unwrap())
    }
}

/// Compiler wrapper that counts invocations.
#[derive(Debug, Default)]
pub struct CountingCompiler {
    calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StyleCompiler for CountingCompiler {
    fn compile(&self, source: &str, options: &CompileOptions) -> Result<String, StyleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ScssCompiler.compile(source, options)
    }
}

/// Count non-overlapping occurrences of `needle`.
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Bind an ephemeral port on localhost.
pub async fn local_listener() -> (tokio::net::TcpListener, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
