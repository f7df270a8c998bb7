//! Theme file resolution.
//!
//! # Data Flow
//! ```text
//! logical name + kind (template | layout | component)
//!     → locator.rs (reject `..`, memo lookup)
//!     → probe child root → parent root → fallback root
//!     → TemplateReference (physical path + layer) or NotFound
//! ```
//!
//! # Design Decisions
//! - Roots are an explicit ordered list, first existing file wins
//! - Lookups are memoized per request only; deploys can change the tree
//! - In debug mode watcher.rs bumps a change stamp that the browser polls

pub mod locator;
pub mod watcher;

pub use locator::{Kind, Layer, LocateError, RequestLocator, TemplateReference, ThemeRoots};
pub use watcher::{ChangeFilter, ChangeStamp, ThemeWatcher};
