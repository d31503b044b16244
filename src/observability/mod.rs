//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stdout + optional file)
//!     → metrics.rs (counters, histograms)
//!     → report.rs (one summary line per normalized request)
//!
//! Consumers:
//!     → Log aggregation (stdout, file)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing, pretty for terminals
//! - Request ID lives in the request span only; forwarded headers are untouched
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;
pub mod report;

pub use logging::{init_logging, LoggingError};
pub use report::{RequestSummary, REPORT_TARGET};
