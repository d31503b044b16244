//! Local status endpoint.
//!
//! Answered by the proxy itself when `status.path` is configured. Everything
//! else, including other methods on that path, goes to the backend.

pub mod handlers;

pub use handlers::{get_status, ProxyStatus};
