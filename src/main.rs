//! pagewright server
//!
//! Serves a themed site: each request is matched against the route table,
//! its template is rendered inside its layout, and the styles and scripts of
//! every component used on the page are collected and emitted once.
//!
//! # Architecture Overview
//!
//! ```text
//!     Request ──▶ http server ──▶ routing ──▶ theme locator
//!                                                 │
//!                                                 ▼
//!                                 render (layout → template → components)
//!                                                 │
//!                       styles (compile + cache) ◀┤
//!                                                 ▼
//!     Response ◀──────────────── emit (<link>/<style>, <script>)
//!
//!     config watcher ──▶ rebuild Site ──▶ swapped in atomically
//!     admin API ──▶ status / routes / cache / purge
//! ```
//!
//! Debug mode is enabled with `PAGEWRIGHT_DEBUG=1` (or `--debug`).

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use pagewright::config::{load_config, ConfigWatcher, Mode};
use pagewright::observability::{logging::init_logging, metrics::init_metrics};
use pagewright::{HttpServer, Shutdown, SiteConfig};

#[derive(Parser)]
#[command(name = "pagewright")]
#[command(about = "Serve a pagewright theme", long_about = None)]
struct Args {
    /// Path to the site configuration file.
    #[arg(short, long, default_value = "pagewright.toml")]
    config: PathBuf,

    /// Force debug mode regardless of the environment.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mode = if args.debug { Mode::Debug } else { Mode::from_env() };

    let config = if args.config.exists() {
        load_config(&args.config, mode)?
    } else {
        SiteConfig::default()
    };
    init_logging(Some(config.observability.log_level.as_str()));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = mode.as_str(),
        config = %args.config.display(),
        "pagewright starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let (watcher, config_updates) = ConfigWatcher::new(&args.config, mode);
    let _watch_guard = if args.config.exists() {
        match watcher.run() {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(error = %e, "Config watching disabled");
                None
            }
        }
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal = shutdown.clone();
    tokio::spawn(async move { signal.trigger_on_ctrl_c().await });

    let server = HttpServer::new(config, mode)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
