//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Timestamp prefix injected into user messages, e.g. `[Wed 2026-02-18 20:48 UTC]`.
pub const DEFAULT_TIMESTAMP_PATTERN: &str =
    r"\[(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) \d{4}-\d{2}-\d{2} \d{2}:\d{2} UTC\]";

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Inference server the proxy forwards to.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Which fragments are stripped and how.
    pub normalization: NormalizationConfig,

    /// Requests whose bodies are normalized. Everything else is passed through.
    pub targets: Vec<TargetConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request capture settings.
    pub capture: CaptureConfig,

    /// Local status endpoint.
    pub status: StatusConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backend: BackendConfig::default(),
            timeouts: TimeoutConfig::default(),
            normalization: NormalizationConfig::default(),
            targets: default_targets(),
            observability: ObservabilityConfig::default(),
            capture: CaptureConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1234").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1234".to_string(),
        }
    }
}

/// Backend (inference server) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL requests are forwarded to. A path component is prepended
    /// to every forwarded path.
    pub base_url: String,

    /// Maximum number of in-flight backend exchanges.
    pub max_connections: usize,

    /// Maximum idle pooled connections kept to the backend.
    pub max_idle_per_host: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:12345".to_string(),
            max_connections: 256,
            max_idle_per_host: 32,
            idle_timeout_secs: 90,
        }
    }
}

/// Timeout configuration for backend operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the backend to produce response headers, in seconds.
    /// Streaming bodies are not bounded by this.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 300,
        }
    }
}

/// Normalization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Strip volatile object keys (e.g. `message_id`) at every depth.
    pub strip_volatile_keys: bool,

    /// Strip timestamp prefixes at the start of text lines.
    pub strip_timestamp_prefixes: bool,

    /// Object keys treated as volatile.
    pub volatile_keys: Vec<String>,

    /// Regular expressions for volatile prefixes. Each is anchored at the
    /// start of a line and may be followed by one whitespace character.
    pub prefix_patterns: Vec<String>,

    /// Top-level fields holding the request's item list (for counting).
    pub item_fields: Vec<String>,

    /// Largest request body that is buffered for normalization.
    pub max_body_bytes: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            strip_volatile_keys: true,
            strip_timestamp_prefixes: true,
            volatile_keys: vec!["message_id".to_string()],
            prefix_patterns: vec![DEFAULT_TIMESTAMP_PATTERN.to_string()],
            item_fields: vec!["input".to_string(), "messages".to_string()],
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// A request whose body is normalized before forwarding.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Target identifier for logging.
    pub name: String,

    /// Exact request path to match.
    pub path: String,

    /// Methods to match (e.g. ["POST"]).
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
}

fn default_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            name: "responses".to_string(),
            path: "/v1/responses".to_string(),
            methods: default_methods(),
        },
        TargetConfig {
            name: "chat-completions".to_string(),
            path: "/v1/chat/completions".to_string(),
            methods: default_methods(),
        },
    ]
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Stdout log format.
    pub log_format: LogFormat,

    /// Optional file the same events are appended to.
    pub log_file: Option<PathBuf>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Request capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CaptureConfig {
    /// JSON Lines file inbound target requests are appended to.
    pub path: Option<PathBuf>,
    /// Also record passthrough requests (headers and response side only,
    /// their bodies stream straight through).
    pub include_passthrough: bool,
}

/// Local status endpoint configuration.
///
/// Disabled by default so the proxy stays transparent to every backend path.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    /// Path answered by the proxy itself (e.g. "/proxy/health").
    pub path: Option<String>,
}
