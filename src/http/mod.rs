//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → page handler → spawn_blocking(render_page)
//!     → status mapping (404 / 400 / 500)
//!     → Send to client
//! ```
//!
//! Generated assets (`site.css`, component scripts) are served from the
//! asset directory under `assets.url_prefix`.

pub mod server;

pub use server::{error_response, AppState, HttpServer, SiteState};
