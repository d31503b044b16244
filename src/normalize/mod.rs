//! Request normalization subsystem.
//!
//! # Data Flow
//! ```text
//! serde_json::Value (request body)
//!     → mod.rs (depth-first walk, item accounting)
//!     → matchers.rs (volatile keys, line-anchored timestamp prefixes)
//!     → fragment.rs (fenced JSON inside strings, parsed and re-rendered)
//!     → counters.rs (per-request removal counts)
//!     → Normalized { value, counts, changed }
//! ```
//!
//! # Design Decisions
//! - Pure and synchronous: no I/O, no shared state, no history
//! - Idempotent: a second pass over its own output removes nothing
//! - Embedded fragments that fail to parse are passed through verbatim
//! - Untouched fragments keep their original bytes

pub mod counters;
pub mod fragment;
pub mod matchers;

use serde_json::{Map, Value};

use crate::config::NormalizationConfig;

pub use counters::RemovalCounts;
pub use fragment::{Document, FragmentError, Layout};
pub use matchers::{PrefixMatcher, VolatileKeys};

use fragment::Segment;

/// Result of normalizing one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub value: Value,
    pub counts: RemovalCounts,
    /// True if any fragment was removed.
    pub changed: bool,
}

/// Strips volatile fragments from request bodies.
///
/// Built once from configuration; disabled features compile to `None`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    keys: Option<VolatileKeys>,
    prefixes: Option<PrefixMatcher>,
    item_fields: Vec<String>,
}

struct Walked {
    value: Value,
    changed: bool,
}

impl Normalizer {
    /// Compile a normalizer from configuration.
    pub fn new(config: &NormalizationConfig) -> Result<Self, regex::Error> {
        let keys = config
            .strip_volatile_keys
            .then(|| VolatileKeys::new(config.volatile_keys.iter().cloned()));
        let prefixes = if config.strip_timestamp_prefixes {
            Some(PrefixMatcher::new(&config.prefix_patterns)?)
        } else {
            None
        };

        Ok(Self {
            keys,
            prefixes,
            item_fields: config.item_fields.clone(),
        })
    }

    /// Normalize a request body.
    ///
    /// Items are the elements of a top-level array, or of the first configured
    /// item field holding an array; any other body counts as one item.
    pub fn normalize(&self, value: Value) -> Normalized {
        let mut counts = RemovalCounts::default();
        let walked = match value {
            Value::Object(map) => match self.item_field(&map) {
                Some(field) => self.walk_envelope(map, &field, &mut counts),
                None => self.walk_item(Value::Object(map), &mut counts),
            },
            Value::Array(items) => {
                let (items, changed) = self.walk_items(items, &mut counts);
                Walked {
                    value: Value::Array(items),
                    changed,
                }
            }
            other => self.walk_item(other, &mut counts),
        };

        Normalized {
            value: walked.value,
            counts,
            changed: walked.changed,
        }
    }

    fn item_field(&self, map: &Map<String, Value>) -> Option<String> {
        self.item_fields
            .iter()
            .find(|field| matches!(map.get(field.as_str()), Some(Value::Array(_))))
            .cloned()
    }

    fn is_volatile(&self, key: &str) -> bool {
        self.keys.as_ref().is_some_and(|keys| keys.contains(key))
    }

    fn walk_envelope(&self, map: Map<String, Value>, field: &str, counts: &mut RemovalCounts) -> Walked {
        let mut out = Map::with_capacity(map.len());
        let mut changed = false;
        for (key, child) in map {
            if self.is_volatile(&key) {
                counts.keys_removed += 1;
                changed = true;
                continue;
            }
            let child = match child {
                Value::Array(items) if key == field => {
                    let (items, items_changed) = self.walk_items(items, counts);
                    changed |= items_changed;
                    Value::Array(items)
                }
                other => {
                    let walked = self.walk(other, counts);
                    changed |= walked.changed;
                    walked.value
                }
            };
            out.insert(key, child);
        }
        Walked {
            value: Value::Object(out),
            changed,
        }
    }

    fn walk_items(&self, items: Vec<Value>, counts: &mut RemovalCounts) -> (Vec<Value>, bool) {
        let mut changed = false;
        let items = items
            .into_iter()
            .map(|item| {
                let walked = self.walk_item(item, counts);
                changed |= walked.changed;
                walked.value
            })
            .collect();
        (items, changed)
    }

    fn walk_item(&self, item: Value, counts: &mut RemovalCounts) -> Walked {
        counts.items_inspected += 1;
        let walked = self.walk(item, counts);
        if walked.changed {
            counts.items_modified += 1;
        }
        walked
    }

    fn walk(&self, value: Value, counts: &mut RemovalCounts) -> Walked {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                let mut changed = false;
                for (key, child) in map {
                    if self.is_volatile(&key) {
                        counts.keys_removed += 1;
                        changed = true;
                        continue;
                    }
                    let walked = self.walk(child, counts);
                    changed |= walked.changed;
                    out.insert(key, walked.value);
                }
                Walked {
                    value: Value::Object(out),
                    changed,
                }
            }
            Value::Array(items) => {
                let mut changed = false;
                let items = items
                    .into_iter()
                    .map(|item| {
                        let walked = self.walk(item, counts);
                        changed |= walked.changed;
                        walked.value
                    })
                    .collect();
                Walked {
                    value: Value::Array(items),
                    changed,
                }
            }
            Value::String(text) => match self.rewrite_text(&text, counts) {
                Some(text) => Walked {
                    value: Value::String(text),
                    changed: true,
                },
                None => Walked {
                    value: Value::String(text),
                    changed: false,
                },
            },
            scalar @ (Value::Null | Value::Bool(_) | Value::Number(_)) => Walked {
                value: scalar,
                changed: false,
            },
        }
    }

    /// Rewrite a text value, or `None` if nothing in it is volatile.
    fn rewrite_text(&self, text: &str, counts: &mut RemovalCounts) -> Option<String> {
        if self.prefixes.is_none() && !text.contains('`') {
            return None;
        }

        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        for segment in fragment::segments(text) {
            match segment {
                Segment::Plain { text, at_line_start } => {
                    let stripped = self
                        .prefixes
                        .as_ref()
                        .and_then(|prefixes| prefixes.strip(text, at_line_start));
                    match stripped {
                        Some((stripped, removed)) => {
                            counts.prefixes_removed += removed;
                            changed = true;
                            out.push_str(&stripped);
                        }
                        None => out.push_str(text),
                    }
                }
                Segment::Fenced { open, body, close } => {
                    out.push_str(open);
                    match self.rewrite_fragment(body, counts) {
                        Some(body) => {
                            changed = true;
                            out.push_str(&body);
                        }
                        None => out.push_str(body),
                    }
                    out.push_str(close);
                }
            }
        }

        changed.then_some(out)
    }

    /// Normalize a fenced JSON span, or `None` to keep it as written.
    fn rewrite_fragment(&self, body: &str, counts: &mut RemovalCounts) -> Option<String> {
        if !fragment::is_structured(body) {
            return None;
        }
        let Document { value, frame } = match Document::parse(body) {
            Ok(doc) => doc,
            // Not JSON after all: the span passes through untouched.
            Err(_) => return None,
        };

        let mut inner = RemovalCounts::default();
        let walked = self.walk(value, &mut inner);
        if !walked.changed {
            return None;
        }
        match frame.render(&walked.value) {
            Ok(text) => {
                *counts += inner;
                Some(text)
            }
            Err(err) => {
                tracing::debug!(error = %err, "Embedded fragment left as written");
                None
            }
        }
    }
}
