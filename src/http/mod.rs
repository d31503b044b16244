//! HTTP relay subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all relay handler)
//!     → [routing decides: target or passthrough]
//!     → body.rs (target: buffer, normalize, fail open)
//!     → forward.rs (backend URI, headers, framing)
//!     → pooled hyper client (bounded by the connection semaphore)
//!     → stream.rs (backend body relayed chunk by chunk, summary at the end)
//!     → Send to client
//! ```

pub mod body;
pub mod error;
pub mod forward;
pub mod server;
pub mod stream;

pub use error::{BuildError, RelayError};
pub use server::{AppState, HttpServer};
