//! pagewright: route-driven page rendering for component themes.

pub mod admin;
pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod render;
pub mod routing;
pub mod site;
pub mod styles;
pub mod theme;

pub use config::schema::SiteConfig;
pub use config::Mode;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use render::{render_page, PageError, RenderedPage};
pub use site::{Site, SiteError};
