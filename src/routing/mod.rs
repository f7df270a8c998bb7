//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup / reload):
//!     RouteTable (declaration order)
//!     → router.rs (defaults, integrity checks)
//!     → pattern.rs (compile `:param` patterns, cached per string)
//!     → Freeze as immutable Router
//!
//! Incoming Request path
//!     → router.rs (strip query, scan in order)
//!     → pattern.rs (segment match, capture params)
//!     → Return: RouteMatch (template + layout + params) or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod pattern;
pub mod router;

pub use pattern::{CompiledPattern, Params, PatternCache, PatternError};
pub use router::{strip_query, LoadPolicy, Route, RouteError, RouteMatch, Router, DEFAULT_LAYOUT};
