//! Response body scanning.
//!
//! Understands both streamed (SSE) and buffered JSON responses from the
//! chat completions and responses APIs. Used by replay to report what came
//! back, and by the relay to attach the response side to a capture record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw bytes kept for a whole-body parse when no SSE events show up.
const MAX_RAW_BYTES: usize = 8 * 1024 * 1024;

/// What a response body contained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// SSE `data:` events received, `[DONE]` excluded.
    pub events: usize,
    /// Last `usage` object the backend reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    /// Assistant text, concatenated from deltas or taken from the final message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_text: String,
    /// Names of the functions the model called, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<String>,
}

/// Incremental scanner over a response body.
///
/// `usage` is read at the top level (chat completions) or under `response`
/// (responses API). A body with no events is parsed as one JSON document at
/// the end.
#[derive(Debug, Default)]
pub struct EventScanner {
    pending: Vec<u8>,
    raw: Vec<u8>,
    overflowed: bool,
    summary: EventSummary,
}

impl EventScanner {
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.overflowed && self.summary.events == 0 {
            if self.raw.len() + chunk.len() > MAX_RAW_BYTES {
                self.overflowed = true;
                self.raw = Vec::new();
            } else {
                self.raw.extend_from_slice(chunk);
            }
        }
        self.pending.extend_from_slice(chunk);
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.line(&line);
        }
    }

    pub fn finish(mut self) -> EventSummary {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.line(&line);
        }
        if self.summary.events == 0 && !self.overflowed {
            if let Ok(value) = serde_json::from_slice::<Value>(&self.raw) {
                self.observe(&value);
            }
        }
        self.summary
    }

    fn line(&mut self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            return;
        };
        let Some(data) = line.trim_end().strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();
        if data.is_empty() || data == "[DONE]" {
            return;
        }
        self.summary.events += 1;
        self.raw = Vec::new();
        if let Ok(value) = serde_json::from_str::<Value>(data) {
            self.observe(&value);
        }
    }

    fn observe(&mut self, value: &Value) {
        let usage = value
            .get("usage")
            .or_else(|| value.get("response").and_then(|r| r.get("usage")))
            .filter(|u| u.is_object());
        if let Some(usage) = usage {
            self.summary.usage = Some(usage.clone());
        }

        match value.get("type").and_then(Value::as_str) {
            Some("response.output_text.delta") => {
                if let Some(delta) = value.get("delta").and_then(Value::as_str) {
                    self.summary.output_text.push_str(delta);
                }
            }
            Some("response.completed") => {
                if let Some(response) = value.get("response") {
                    self.observe_response(response);
                }
            }
            _ if value.get("object").and_then(Value::as_str) == Some("response") => self.observe_response(value),
            _ => self.observe_choices(value),
        }
    }

    /// A finished responses API object: its `output` is authoritative.
    fn observe_response(&mut self, response: &Value) {
        let Some(output) = response.get("output").and_then(Value::as_array) else {
            return;
        };
        let mut calls = Vec::new();
        for item in output {
            match item.get("type").and_then(Value::as_str) {
                Some("function_call") => calls.push(name_of(item)),
                Some("message") => {
                    let blocks = item.get("content").and_then(Value::as_array).into_iter().flatten();
                    for block in blocks {
                        if block.get("type").and_then(Value::as_str) == Some("output_text") {
                            if let Some(text) = block.get("text").and_then(Value::as_str) {
                                self.summary.output_text = text.to_string();
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        self.summary.function_calls = calls;
    }

    /// Chat completions: streamed `delta` chunks or a buffered `message`.
    fn observe_choices(&mut self, value: &Value) {
        let Some(choice) = value.get("choices").and_then(|c| c.get(0)) else {
            return;
        };
        if let Some(delta) = choice.get("delta") {
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                self.summary.output_text.push_str(text);
            }
            for call in tool_calls(delta) {
                // Later deltas of the same call carry arguments only.
                if let Some(name) = call.get("function").and_then(|f| f.get("name")).and_then(Value::as_str) {
                    self.summary.function_calls.push(name.to_string());
                }
            }
        } else if let Some(message) = choice.get("message") {
            if let Some(text) = message.get("content").and_then(Value::as_str) {
                self.summary.output_text = text.to_string();
            }
            self.summary.function_calls = tool_calls(message)
                .map(|call| call.get("function").map_or_else(|| "?".to_string(), name_of))
                .collect();
        }
    }
}

fn tool_calls(value: &Value) -> impl Iterator<Item = &Value> {
    value.get("tool_calls").and_then(Value::as_array).into_iter().flatten()
}

fn name_of(value: &Value) -> String {
    value.get("name").and_then(Value::as_str).unwrap_or("?").to_string()
}
