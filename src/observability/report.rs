//! Per-request summary line.
//!
//! ```text
//! POST /v1/responses | items=12 | ts_removed=1 | msg_ids_removed=3 | items_modified=2 | stream=true
//! ```
//!
//! Emitted once, when the response body has been fully relayed.

use std::fmt;

use axum::http::Method;

use crate::normalize::RemovalCounts;

/// Log target of summary lines, so they can be filtered on their own.
pub const REPORT_TARGET: &str = "prefix_stable_proxy::report";

/// Everything the summary line reports about one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub counts: RemovalCounts,
    pub stream: bool,
}

impl RequestSummary {
    pub fn emit(&self) {
        tracing::info!(target: REPORT_TARGET, "{}", self);
    }
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | items={} | ts_removed={} | msg_ids_removed={} | items_modified={} | stream={}",
            self.method,
            self.path,
            self.counts.items_inspected,
            self.counts.prefixes_removed,
            self.counts.keys_removed,
            self.counts.items_modified,
            self.stream
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_field_order() {
        let summary = RequestSummary {
            method: Method::POST,
            path: "/v1/responses".into(),
            counts: RemovalCounts {
                items_inspected: 12,
                prefixes_removed: 1,
                keys_removed: 3,
                items_modified: 2,
            },
            stream: true,
        };

        assert_eq!(
            summary.to_string(),
            "POST /v1/responses | items=12 | ts_removed=1 | msg_ids_removed=3 | items_modified=2 | stream=true"
        );
    }

    #[test]
    fn renders_untouched_request() {
        let summary = RequestSummary {
            method: Method::POST,
            path: "/v1/chat/completions".into(),
            counts: RemovalCounts::default(),
            stream: false,
        };

        assert_eq!(
            summary.to_string(),
            "POST /v1/chat/completions | items=0 | ts_removed=0 | msg_ids_removed=0 | items_modified=0 | stream=false"
        );
    }
}
