//! Replay captured requests through a running proxy.
//!
//! Requests are sent one at a time, in capture order, so consecutive turns of
//! a conversation reach the backend in the order the client produced them.
//! Streaming (SSE) bodies are consumed to the end; events are counted and the
//! model's text and function calls collected.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::capture::{CaptureError, CaptureRecord, EventScanner};

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Base URL of the proxy, e.g. `http://127.0.0.1:1234`.
    pub proxy_url: String,
    /// Set `"stream": true` on every JSON object body.
    pub force_stream: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:1234".to_string(),
            force_stream: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Result of replaying one record.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub index: usize,
    pub method: String,
    pub path: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub bytes: u64,
    /// SSE `data:` events received, `[DONE]` excluded.
    pub events: usize,
    /// Last `usage` object the backend reported.
    pub usage: Option<Value>,
    pub output_text: String,
    pub function_calls: Vec<String>,
    pub error: Option<String>,
}

/// Replay `records` sequentially. Fails only if the HTTP client cannot be built.
pub async fn replay(records: &[CaptureRecord], options: &ReplayOptions) -> Result<Vec<ReplayOutcome>, CaptureError> {
    let client = reqwest::Client::builder().timeout(options.timeout).build()?;
    let base = options.proxy_url.trim_end_matches('/');

    let mut outcomes = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let mut outcome = ReplayOutcome {
            index,
            method: record.method.clone(),
            path: record.path.clone(),
            status: None,
            elapsed_ms: 0,
            bytes: 0,
            events: 0,
            usage: None,
            output_text: String::new(),
            function_calls: Vec::new(),
            error: None,
        };

        let start = Instant::now();
        if let Err(err) = send(&client, base, record, options.force_stream, &mut outcome).await {
            tracing::warn!(index, path = %record.path, error = %err, "Replay request failed");
            outcome.error = Some(err);
        }
        outcome.elapsed_ms = start.elapsed().as_millis() as u64;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn send(
    client: &reqwest::Client,
    base: &str,
    record: &CaptureRecord,
    force_stream: bool,
    outcome: &mut ReplayOutcome,
) -> Result<(), String> {
    let method = Method::from_bytes(record.method.as_bytes()).map_err(|e| e.to_string())?;
    let body = match (&record.body, force_stream) {
        (Some(Value::Object(map)), true) => {
            let mut map = map.clone();
            map.insert("stream".to_string(), Value::Bool(true));
            serde_json::to_vec(&Value::Object(map)).map_err(|e| e.to_string())?
        }
        _ => record.body_bytes().map_err(|e| e.to_string())?,
    };

    let mut request = client.request(method, format!("{base}{}", record.path));
    if record.body.is_some() {
        request = request.header(CONTENT_TYPE, "application/json");
    }
    let response = request.body(body).send().await.map_err(|e| e.to_string())?;
    outcome.status = Some(response.status().as_u16());

    let mut scanner = EventScanner::default();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        outcome.bytes += chunk.len() as u64;
        scanner.push(&chunk);
    }
    let summary = scanner.finish();

    outcome.events = summary.events;
    outcome.usage = summary.usage;
    outcome.output_text = summary.output_text;
    outcome.function_calls = summary.function_calls;
    Ok(())
}
