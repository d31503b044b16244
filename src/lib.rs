//! Prefix-stable proxy library.
//!
//! An HTTP relay in front of an LLM inference server that strips per-turn
//! volatile fragments (message ids, timestamp prefixes) from request bodies so
//! that identical conversation history serializes to identical bytes and the
//! backend's prompt cache keeps hitting.

pub mod admin;
pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod normalize;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use normalize::{Normalized, Normalizer, RemovalCounts};
