//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured logs, request-id carrying spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metrics are cheap (atomic increments) and no-ops without a recorder
//! - The log filter comes from the environment, then from config

pub mod logging;
pub mod metrics;
