//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for pages and generated assets
//! - Wire up middleware (tracing, timeout, request ID)
//! - Run the synchronous render pipeline off the async workers
//! - Map render failures to status codes
//! - Swap in a freshly built site when the config changes
//! - Expose the theme change stamp for live reload in debug mode
//! - Serve the admin API on its own listener when enabled

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{Mode, SiteConfig};
use crate::observability::metrics;
use crate::render::{render_page, PageError, RenderError, LIVE_RELOAD_PATH};
use crate::routing::PatternCache;
use crate::site::{Site, SiteError};
use crate::styles::{ScssCompiler, StyleCache, StyleCompiler};
use crate::theme::{ChangeStamp, LocateError, ThemeWatcher};

/// The site currently being served and the config it was built from.
#[derive(Debug)]
pub struct SiteState {
    pub site: Arc<Site>,
    pub config: SiteConfig,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<SiteState>>,
    /// Bounds concurrent renders to `listener.max_connections`.
    pub render_slots: Arc<Semaphore>,
    /// Last theme change, polled by the live reload script.
    pub stamp: ChangeStamp,
}

impl AppState {
    pub fn site(&self) -> Arc<Site> {
        self.inner.load().site.clone()
    }
}

/// HTTP server for a pagewright site.
pub struct HttpServer {
    state: AppState,
    config: SiteConfig,
    mode: Mode,
    compiler: Arc<dyn StyleCompiler>,
    cache: StyleCache,
    patterns: PatternCache,
}

impl HttpServer {
    /// Build the initial site with the built-in style compiler.
    pub fn new(config: SiteConfig, mode: Mode) -> Result<Self, SiteError> {
        Self::with_compiler(config, mode, Arc::new(ScssCompiler))
    }

    /// Build the initial site with a custom style compiler.
    pub fn with_compiler(
        config: SiteConfig,
        mode: Mode,
        compiler: Arc<dyn StyleCompiler>,
    ) -> Result<Self, SiteError> {
        let cache = StyleCache::load(&config.styles.cache_path);
        let patterns = PatternCache::new();
        let site = Site::build(&config, mode, compiler.clone(), cache.clone(), &patterns)?;

        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(SiteState {
                site: Arc::new(site),
                config: config.clone(),
            })),
            render_slots: Arc::new(Semaphore::new(config.listener.max_connections.max(1))),
            stamp: ChangeStamp::new(),
        };

        Ok(Self {
            state,
            config,
            mode,
            compiler,
            cache,
            patterns,
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Page and asset router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let site = self.state.site();
        let assets = site.assets().clone();
        let mut router = Router::new()
            .route("/", get(page_handler))
            .route("/{*path}", get(page_handler));
        if site.live_reload_interval().is_some() {
            router = router.route(LIVE_RELOAD_PATH, get(reload_handler));
        }
        if !assets.url_prefix().is_empty() {
            router = router.nest_service(assets.url_prefix(), ServeDir::new(assets.dir()));
        }

        router.with_state(self.state.clone()).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    self.config.timeouts.request_secs,
                ))),
        )
    }

    /// Admin API router (bearer-token protected).
    pub fn admin_router(&self) -> Router {
        setup_admin_router(self.state.clone())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<SiteConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = self.mode.as_str(), "HTTP server starting");

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin_addr = admin_listener.local_addr()?;
            let admin_app = self.admin_router();
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %admin_addr, "Admin API listening");
            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        let _theme_watcher = if self.state.site().live_reload_interval().is_some() {
            match ThemeWatcher::new(&self.config, self.state.stamp.clone()).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Theme watcher failed to start, live reload disabled");
                    None
                }
            }
        } else {
            None
        };

        let state = self.state.clone();
        let mode = self.mode;
        let compiler = self.compiler.clone();
        let cache = self.cache.clone();
        let patterns = self.patterns.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match Site::build(&config, mode, compiler.clone(), cache.clone(), &patterns) {
                    Ok(site) => {
                        state.inner.store(Arc::new(SiteState {
                            site: Arc::new(site),
                            config,
                        }));
                        tracing::info!("Site reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Reload rejected, keeping current site");
                    }
                }
            }
        });

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }
}

/// Render the page for the request path.
async fn page_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let start = Instant::now();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let Ok(permit) = state.render_slots.clone().acquire_owned().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    };

    let site = state.site();
    let mode = site.mode();
    let rendered = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        render_page(&site, &target)
    })
    .await;

    match rendered {
        Ok(Ok(page)) => {
            metrics::record_request(&page.route, 200, start);
            Html(page.html).into_response()
        }
        Ok(Err(e)) => {
            let (status, body) = error_response(&e, mode);
            metrics::record_request("none", status.as_u16(), start);
            (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Render task failed");
            metrics::record_request("none", 500, start);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct ReloadStamp {
    stamp: u64,
}

/// Current theme change stamp.
async fn reload_handler(State(state): State<AppState>) -> Json<ReloadStamp> {
    Json(ReloadStamp {
        stamp: state.stamp.current(),
    })
}

/// Status and visible message for a failed render.
pub fn error_response(error: &PageError, mode: Mode) -> (StatusCode, String) {
    match error {
        PageError::NoRoute(path) => {
            tracing::debug!(path = %path, "No route matched");
            (StatusCode::NOT_FOUND, "Not Found".to_string())
        }
        PageError::Render(RenderError::Locate(e @ LocateError::PathTraversalRejected { .. })) => {
            tracing::warn!(error = %e, "Rejected theme lookup");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        PageError::Render(RenderError::Locate(e)) => {
            tracing::error!(error = %e, "Missing theme file");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        PageError::Render(e) => {
            tracing::error!(error = %e, "Render failed");
            let body = if mode.is_debug() {
                e.to_string()
            } else {
                "Internal Server Error".to_string()
            };
            (StatusCode::INTERNAL_SERVER_ERROR, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::StyleError;

    #[test]
    fn test_error_statuses() {
        let not_found = PageError::NoRoute("/x".into());
        assert_eq!(error_response(&not_found, Mode::Production).0, StatusCode::NOT_FOUND);

        let traversal = PageError::Render(RenderError::Locate(LocateError::PathTraversalRejected {
            kind: crate::theme::Kind::Template,
            name: "../x".into(),
        }));
        assert_eq!(error_response(&traversal, Mode::Production).0, StatusCode::BAD_REQUEST);

        let missing = PageError::Render(RenderError::Locate(LocateError::TemplateNotFound(
            "work".into(),
        )));
        let (status, body) = error_response(&missing, Mode::Production);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "The file for the template work does not exist");
    }

    #[test]
    fn test_details_hidden_in_production() {
        let style = PageError::Render(RenderError::Style(StyleError::Compilation {
            source_name: "components/card".into(),
            line: 3,
            message: "undefined variable $x".into(),
        }));
        assert_eq!(error_response(&style, Mode::Production).1, "Internal Server Error");
        assert!(error_response(&style, Mode::Debug).1.contains("undefined variable $x"));
    }
}
