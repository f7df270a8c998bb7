//! Component style compilation subsystem.
//!
//! # Data Flow
//! ```text
//! <style> block extracted from a component (text + source line)
//!     → service.rs (prelude + block, checksum over text and mode)
//!     → cache.rs hit?  → compiled CSS
//!     → miss: compiler.rs (StyleCompiler trait) → scss.rs
//!     → cache.rs insert (atomic JSON persist) → compiled CSS
//! ```
//!
//! # Design Decisions
//! - The compiler is an explicit service object, injected through a trait
//! - Cache entries are keyed by source identity and validated by checksum
//! - Production degrades to raw style text; debug surfaces compile errors

pub mod cache;
pub mod compiler;
pub mod scss;
pub mod service;

pub use cache::{StyleCache, StyleCacheEntry};
pub use compiler::{checksum, CompileOptions, ScssCompiler, StyleCompiler, StyleError};
pub use service::{StyleService, SITE_STYLE_KEY};
