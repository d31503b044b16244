//! Target request bodies.
//!
//! # Responsibilities
//! - Buffer the body up to the configured limit
//! - Normalize it, re-rendering in the caller's own layout
//! - Fail open: anything unparsable is forwarded byte for byte

use axum::body::{Body, Bytes};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::http::error::RelayError;
use crate::normalize::{Document, Normalizer, RemovalCounts};

/// What happened to a target body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fragments were removed and the body re-rendered.
    Rewritten,
    /// Nothing to strip; original bytes forwarded.
    Unchanged,
    /// Not UTF-8 JSON; original bytes forwarded.
    FailOpen,
}

/// A target body ready to forward.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub bytes: Bytes,
    pub counts: RemovalCounts,
    /// The caller asked for `"stream": true`.
    pub stream: bool,
    pub disposition: Disposition,
}

impl Prepared {
    fn passthrough(bytes: Bytes, disposition: Disposition) -> Self {
        Self {
            bytes,
            counts: RemovalCounts::default(),
            stream: false,
            disposition,
        }
    }
}

/// Read a whole request body, refusing anything over `limit` bytes.
pub async fn read_limited(body: Body, limit: usize) -> Result<Bytes, RelayError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge { limit })
        }
        Err(err) => Err(RelayError::BodyRead(err)),
    }
}

/// Normalize a buffered body.
pub fn prepare(normalizer: &Normalizer, bytes: Bytes) -> Prepared {
    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(error = %err, "Body is not UTF-8, forwarding as-is");
            return Prepared::passthrough(bytes, Disposition::FailOpen);
        }
    };
    let document = match Document::parse(text) {
        Ok(document) => document,
        Err(err) => {
            tracing::debug!(error = %err, "Body is not JSON, forwarding as-is");
            return Prepared::passthrough(bytes, Disposition::FailOpen);
        }
    };

    let stream = document.value.get("stream") == Some(&Value::Bool(true));
    let normalized = normalizer.normalize(document.value);
    if !normalized.changed {
        return Prepared {
            bytes,
            counts: normalized.counts,
            stream,
            disposition: Disposition::Unchanged,
        };
    }

    match document.frame.render(&normalized.value) {
        Ok(rendered) => Prepared {
            bytes: Bytes::from(rendered),
            counts: normalized.counts,
            stream,
            disposition: Disposition::Rewritten,
        },
        Err(err) => {
            tracing::warn!(error = %err, "Failed to render normalized body, forwarding as-is");
            Prepared {
                stream,
                ..Prepared::passthrough(bytes, Disposition::FailOpen)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizationConfig;

    fn normalizer() -> Normalizer {
        Normalizer::new(&NormalizationConfig::default()).unwrap()
    }

    #[test]
    fn rewrites_in_original_layout() {
        let body = Bytes::from_static(
            b"{\n  \"model\": \"m\",\n  \"stream\": true,\n  \"input\": [\n    {\"message_id\": \"a\", \"role\": \"user\"}\n  ]\n}\n",
        );
        let prepared = prepare(&normalizer(), body);

        assert_eq!(prepared.disposition, Disposition::Rewritten);
        assert!(prepared.stream);
        assert_eq!(prepared.counts.keys_removed, 1);
        assert_eq!(
            std::str::from_utf8(&prepared.bytes).unwrap(),
            "{\n  \"model\": \"m\",\n  \"stream\": true,\n  \"input\": [\n    {\n      \"role\": \"user\"\n    }\n  ]\n}\n"
        );
    }

    #[test]
    fn unchanged_body_keeps_exact_bytes() {
        let body = Bytes::from_static(b"{ \"input\" : [ {\"role\":\"user\",\"content\":\"hi\"} ], \"x\":1.0 }");
        let prepared = prepare(&normalizer(), body.clone());

        assert_eq!(prepared.disposition, Disposition::Unchanged);
        assert_eq!(prepared.bytes, body);
        assert_eq!(prepared.counts.items_inspected, 1);
        assert!(!prepared.stream);
    }

    #[test]
    fn malformed_bodies_fail_open() {
        for raw in [&b"{\"message_id\": "[..], &b"\xff\xfe{}"[..], &b""[..]] {
            let body = Bytes::copy_from_slice(raw);
            let prepared = prepare(&normalizer(), body.clone());
            assert_eq!(prepared.disposition, Disposition::FailOpen);
            assert_eq!(prepared.bytes, body);
            assert_eq!(prepared.counts, RemovalCounts::default());
        }
    }

    #[tokio::test]
    async fn body_over_limit_is_rejected() {
        let err = read_limited(Body::from(vec![b'x'; 32]), 16).await.unwrap_err();
        assert!(matches!(err, RelayError::PayloadTooLarge { limit: 16 }));

        let bytes = read_limited(Body::from("short"), 16).await.unwrap();
        assert_eq!(bytes, "short");
    }
}
