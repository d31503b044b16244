//! Summaries of captured requests.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::capture::CaptureRecord;

/// One line of `inspect` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub index: usize,
    pub method: String,
    pub path: String,
    pub body_bytes: usize,
    /// Top-level items, if the body has an item list.
    pub items: Option<usize>,
    pub has_tool_calls: bool,
    pub stream: bool,
    /// Backend status, when the response side was captured.
    pub status: Option<u16>,
}

/// Summarize every record. `item_fields` name the envelope fields holding items.
pub fn inspect(records: &[CaptureRecord], item_fields: &[String]) -> Vec<RecordSummary> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| summarize(index, record, item_fields))
        .collect()
}

fn summarize(index: usize, record: &CaptureRecord, item_fields: &[String]) -> RecordSummary {
    let body_bytes = record.body_bytes().map(|b| b.len()).unwrap_or_default();
    let items = record.body.as_ref().and_then(|body| items_of(body, item_fields));

    RecordSummary {
        index,
        method: record.method.clone(),
        path: record.path.clone(),
        body_bytes,
        items: items.map(<[Value]>::len),
        has_tool_calls: items.is_some_and(|items| items.iter().any(is_tool_item)),
        stream: record
            .body
            .as_ref()
            .and_then(|b| b.get("stream"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        status: record.response.as_ref().map(|r| r.status),
    }
}

fn items_of<'a>(body: &'a Value, item_fields: &[String]) -> Option<&'a [Value]> {
    match body {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(map) => item_fields
            .iter()
            .find_map(|field| map.get(field.as_str()).and_then(Value::as_array))
            .map(Vec::as_slice),
        _ => None,
    }
}

fn is_tool_item(item: &Value) -> bool {
    let kind = item.get("type").and_then(Value::as_str);
    let role = item.get("role").and_then(Value::as_str);
    let calls = item
        .get("tool_calls")
        .and_then(Value::as_array)
        .is_some_and(|calls| !calls.is_empty());

    matches!(kind, Some("function_call" | "function_call_output")) || role == Some("tool") || calls
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {} | bytes={}", self.index, self.method, self.path, self.body_bytes)?;
        match self.items {
            Some(n) => write!(f, " | items={n}")?,
            None => write!(f, " | items=-")?,
        }
        write!(f, " | tools={} | stream={}", self.has_tool_calls, self.stream)?;
        if let Some(status) = self.status {
            write!(f, " | status={status}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(body: Value) -> CaptureRecord {
        CaptureRecord {
            received_at_ms: 0,
            method: "POST".into(),
            path: "/v1/responses".into(),
            body: Some(body),
            ..Default::default()
        }
    }

    fn fields() -> Vec<String> {
        vec!["input".into(), "messages".into()]
    }

    #[test]
    fn finds_responses_api_tool_items() {
        let records = vec![
            record(json!({"stream": true, "input": [
                {"role": "user", "content": "hi"},
                {"type": "function_call", "name": "ls", "arguments": "{}"},
                {"type": "function_call_output", "output": "a b"}
            ]})),
            record(json!({"input": [{"role": "user", "content": "hi"}]})),
        ];
        let summaries = inspect(&records, &fields());

        assert_eq!(summaries[0].items, Some(3));
        assert!(summaries[0].has_tool_calls);
        assert!(summaries[0].stream);
        assert!(!summaries[1].has_tool_calls);
        assert!(!summaries[1].stream);
    }

    #[test]
    fn finds_chat_tool_calls() {
        let records = vec![
            record(json!({"messages": [
                {"role": "assistant", "tool_calls": [{"id": "c1"}]},
            ]})),
            record(json!({"messages": [{"role": "tool", "content": "42"}]})),
            record(json!({"messages": [{"role": "assistant", "tool_calls": []}]})),
        ];
        let summaries = inspect(&records, &fields());

        assert!(summaries[0].has_tool_calls);
        assert!(summaries[1].has_tool_calls);
        assert!(!summaries[2].has_tool_calls);
    }

    #[test]
    fn raw_bodies_have_no_items() {
        let raw = CaptureRecord {
            received_at_ms: 0,
            method: "POST".into(),
            path: "/v1/chat/completions".into(),
            raw_body: Some("oops".into()),
            ..Default::default()
        };
        let summary = &inspect(&[raw], &fields())[0];

        assert_eq!(summary.items, None);
        assert_eq!(summary.body_bytes, 4);
        assert_eq!(
            summary.to_string(),
            "#0 POST /v1/chat/completions | bytes=4 | items=- | tools=false | stream=false"
        );
    }
}
