//! Page composition subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → page.rs (route match, locate template + layout)
//!     → component.rs renders layout; outlet() renders the template
//!         → component() calls, depth-first
//!             → render component file (tera)
//!             → extract.rs (split body / <style> / <script>)
//!             → first time this source is seen in the request:
//!                 styles → StyleService (cached compile)
//!                 scripts → queued as-is
//!     → page.rs emit: markers replaced by <link>/<style> and <script>
//!       (debug mode also appends the live reload poller)
//! ```
//!
//! # Design Decisions
//! - All per-request state lives in `RenderContext`, created per request
//! - Dedup identity is the component's physical path (or a content hash
//!   for raw fragments)
//! - Extraction is structural and runs on each component's own output,
//!   so inner components are already stripped when outer ones are scanned

pub mod component;
pub mod context;
pub mod extract;
pub mod page;

pub use component::{
    Collected, ComponentRenderResult, Renderer, SCRIPTS_MARKER, STYLES_MARKER,
};
pub use context::{CollectedScript, CollectedStyle, RenderContext, RenderError};
pub use extract::{extract, Block, Extracted};
pub use page::{render_page, PageError, RenderedPage, LIVE_RELOAD_PATH};
