//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to HttpServer::new, which compiles the normalizer once
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, Overrides};
pub use schema::BackendConfig;
pub use schema::CaptureConfig;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::NormalizationConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::StatusConfig;
pub use schema::TargetConfig;
pub use schema::TimeoutConfig;
