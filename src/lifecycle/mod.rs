//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build site → Start listeners + watcher
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger() → broadcast → servers stop accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to every server task
//! - In-flight renders finish; no new connections are accepted

pub mod shutdown;

pub use shutdown::Shutdown;
