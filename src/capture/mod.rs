//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! Relay (target request before normalization, passthrough if enabled)
//!     → events.rs (response body scanned as it streams back)
//!     → PendingCapture::finish (request + response side, once per exchange)
//!     → writer.rs (bounded queue → background file task)
//!     → capture file (JSON Lines, one CaptureRecord per line)
//!     → reader.rs (ordered records, malformed lines skipped)
//!     → replay.rs (resubmit through a running proxy)
//!     → inspect.rs (per-record summaries)
//! ```
//!
//! # Design Decisions
//! - Capturing never blocks or fails a request: a full queue drops the record
//! - Bodies that are not JSON are kept as raw text
//! - Credentials in request headers are never written

pub mod events;
pub mod inspect;
pub mod reader;
pub mod replay;
pub mod writer;

use std::collections::BTreeMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use events::{EventScanner, EventSummary};
pub use inspect::{inspect, RecordSummary};
pub use reader::{parse_capture, read_capture, CaptureLog};
pub use replay::{replay, ReplayOptions, ReplayOutcome};
pub use writer::{CaptureSink, CaptureWriter};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode capture record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("replay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

const REDACTED: &str = "<redacted>";

/// One inbound request as the caller sent it, plus how the backend answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub received_at_ms: u64,
    pub method: String,
    /// Path and query.
    pub path: String,
    /// Name of the matched target, `None` for passthrough traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CaptureResponse>,
}

/// Response side of a captured exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub status: u16,
    pub outcome: ResponseOutcome,
    pub elapsed_ms: u64,
    pub bytes: u64,
    pub chunks: u64,
    pub summary: EventSummary,
}

/// How a relayed exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    /// Body relayed to the end.
    Completed,
    /// Backend body broke off mid-stream.
    Failed,
    /// Caller went away first.
    Cancelled,
    /// No backend response; `status` is the one the proxy answered with.
    Rejected,
}

impl CaptureRecord {
    pub fn new(method: &str, path: &str, bytes: &[u8]) -> Self {
        let received_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let (body, raw_body) = match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => (Some(value), None),
            Err(_) if bytes.is_empty() => (None, None),
            Err(_) => (None, Some(String::from_utf8_lossy(bytes).into_owned())),
        };

        Self {
            received_at_ms,
            method: method.to_string(),
            path: path.to_string(),
            body,
            raw_body,
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Keep the request headers, credentials masked.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            let value = if is_credential(name) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            match self.headers.get_mut(name.as_str()) {
                Some(existing) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                None => {
                    self.headers.insert(name.as_str().to_string(), value);
                }
            }
        }
        self
    }

    /// Request body bytes, as they would be sent again.
    pub fn body_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match (&self.body, &self.raw_body) {
            (Some(body), _) => serde_json::to_vec(body),
            (None, Some(raw)) => Ok(raw.clone().into_bytes()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

fn is_credential(name: &header::HeaderName) -> bool {
    *name == header::AUTHORIZATION
        || *name == header::PROXY_AUTHORIZATION
        || *name == header::COOKIE
        || name.as_str() == "x-api-key"
}

/// A captured request whose response is still in flight.
///
/// Written exactly once, by [`PendingCapture::finish`] or
/// [`PendingCapture::reject`].
#[derive(Debug)]
pub struct PendingCapture {
    writer: CaptureWriter,
    record: CaptureRecord,
    scanner: EventScanner,
    status: u16,
    start: Instant,
}

impl PendingCapture {
    pub fn new(writer: CaptureWriter, record: CaptureRecord) -> Self {
        Self {
            writer,
            record,
            scanner: EventScanner::default(),
            status: 0,
            start: Instant::now(),
        }
    }

    /// Backend answered with `status`; the body follows.
    pub fn responded(&mut self, status: u16) {
        self.status = status;
    }

    pub fn observe(&mut self, chunk: &[u8]) {
        self.scanner.push(chunk);
    }

    pub fn finish(self, outcome: ResponseOutcome, bytes: u64, chunks: u64) {
        let Self {
            writer,
            mut record,
            scanner,
            status,
            start,
        } = self;
        record.response = Some(CaptureResponse {
            status,
            outcome,
            elapsed_ms: start.elapsed().as_millis() as u64,
            bytes,
            chunks,
            summary: scanner.finish(),
        });
        writer.record(record);
    }

    /// The proxy answered `status` itself, without a backend response.
    pub fn reject(mut self, status: u16) {
        self.status = status;
        self.finish(ResponseOutcome::Rejected, 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_json_and_raw_bodies_apart() {
        let record = CaptureRecord::new("POST", "/v1/responses", br#"{"input":[]}"#);
        assert_eq!(record.body, Some(json!({"input": []})));
        assert!(record.raw_body.is_none());

        let record = CaptureRecord::new("POST", "/v1/responses", b"{not json");
        assert!(record.body.is_none());
        assert_eq!(record.raw_body.as_deref(), Some("{not json"));

        let record = CaptureRecord::new("GET", "/v1/models", b"");
        assert!(record.body.is_none() && record.raw_body.is_none());
        assert!(record.body_bytes().unwrap().is_empty());
    }

    #[test]
    fn serialized_line_omits_missing_bodies() {
        let record = CaptureRecord {
            received_at_ms: 1,
            method: "POST".into(),
            path: "/v1/responses".into(),
            raw_body: Some("x".into()),
            ..Default::default()
        };
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"received_at_ms":1,"method":"POST","path":"/v1/responses","raw_body":"x"}"#
        );
    }

    #[test]
    fn headers_are_kept_with_credentials_masked() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer llama".parse().unwrap());
        headers.insert("x-api-key", "secret".parse().unwrap());
        headers.append("x-tag", "a".parse().unwrap());
        headers.append("x-tag", "b".parse().unwrap());

        let record = CaptureRecord::new("POST", "/v1/responses", b"{}").with_headers(&headers);
        assert_eq!(record.headers["content-type"], "application/json");
        assert_eq!(record.headers["authorization"], REDACTED);
        assert_eq!(record.headers["x-api-key"], REDACTED);
        assert_eq!(record.headers["x-tag"], "a, b");
    }

    #[tokio::test]
    async fn pending_capture_records_response_side() {
        let path = std::env::temp_dir().join(format!("capture-{}.jsonl", uuid::Uuid::new_v4()));
        let (writer, sink) = writer::open(&path, 4).unwrap();

        let record = CaptureRecord::new("POST", "/v1/chat/completions", br#"{"stream":true}"#)
            .with_target(Some("chat".into()));
        let mut pending = PendingCapture::new(writer.clone(), record);
        pending.responded(200);
        pending.observe(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n");
        pending.observe(b"data: {\"choices\":[],\"usage\":{\"total_tokens\":3}}\n\ndata: [DONE]\n\n");
        pending.finish(ResponseOutcome::Completed, 120, 2);

        PendingCapture::new(writer, CaptureRecord::new("POST", "/v1/chat/completions", b"{}")).reject(502);

        assert_eq!(sink.run().await.unwrap(), 2);
        let log = read_capture(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let response = log.records[0].response.as_ref().unwrap();
        assert_eq!(log.records[0].target.as_deref(), Some("chat"));
        assert_eq!(response.status, 200);
        assert_eq!(response.outcome, ResponseOutcome::Completed);
        assert_eq!((response.bytes, response.chunks), (120, 2));
        assert_eq!(response.summary.events, 2);
        assert_eq!(response.summary.output_text, "hi");
        assert_eq!(response.summary.usage, Some(json!({"total_tokens": 3})));

        let rejected = log.records[1].response.as_ref().unwrap();
        assert_eq!((rejected.status, rejected.outcome), (502, ResponseOutcome::Rejected));
    }
}
