//! Target routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (target lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Target (normalize) or None (pass through)
//!
//! Target Compilation (at startup):
//!     TargetConfig[]
//!     → Compile matchers (exact path AND method set)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Targets compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same target
//! - A non-match is not an error: the request is relayed untouched

pub mod matcher;
pub mod router;

pub use router::{Router, Target};
