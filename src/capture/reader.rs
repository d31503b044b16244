//! Capture file reader.

use std::path::Path;

use crate::capture::{CaptureError, CaptureRecord};

/// Records read from a capture file, in file order.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog {
    pub records: Vec<CaptureRecord>,
    /// Lines that were not valid records.
    pub skipped: usize,
}

pub fn read_capture(path: &Path) -> Result<CaptureLog, CaptureError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_capture(&text))
}

/// Parse JSON Lines text. Blank lines are ignored, malformed lines skipped.
pub fn parse_capture(text: &str) -> CaptureLog {
    let mut log = CaptureLog::default();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CaptureRecord>(line) {
            Ok(record) => log.records.push(record),
            Err(err) => {
                tracing::debug!(line = number + 1, error = %err, "Skipping malformed capture line");
                log.skipped += 1;
            }
        }
    }
    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_malformed_lines() {
        let text = concat!(
            r#"{"received_at_ms":1,"method":"POST","path":"/v1/responses","body":{"input":[]}}"#,
            "\n\n",
            "{truncated\n",
            r#"{"received_at_ms":2,"method":"POST","path":"/v1/chat/completions"}"#,
            "\n",
            r#"{"method":"POST"}"#,
            "\n"
        );
        let log = parse_capture(text);

        assert_eq!(log.records.len(), 2);
        assert_eq!(log.skipped, 2);
        assert_eq!(log.records[0].received_at_ms, 1);
        assert_eq!(log.records[1].path, "/v1/chat/completions");
        assert!(log.records[1].body.is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("missing-{}.jsonl", uuid::Uuid::new_v4()));
        assert!(matches!(read_capture(&path), Err(CaptureError::Io(_))));
    }
}
