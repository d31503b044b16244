//! Fragment matchers.
//!
//! Stateless predicates compiled once from configuration: which object keys
//! are volatile, and which lexical prefixes mark a volatile timestamp.

use regex::Regex;

/// Object keys whose value changes every turn.
#[derive(Debug, Clone)]
pub struct VolatileKeys {
    names: Vec<String>,
}

impl VolatileKeys {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `key` names a volatile field.
    pub fn contains(&self, key: &str) -> bool {
        self.names.iter().any(|name| name == key)
    }
}

/// Volatile prefixes anchored at the start of a line.
///
/// A match consumes the pattern plus at most one following whitespace
/// character. Matches elsewhere in a line are never considered.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    patterns: Vec<Regex>,
}

impl PrefixMatcher {
    /// Compile the configured patterns, anchoring each at the start.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("^(?:{})", p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Length in bytes of the volatile prefix at the very start of `text`,
    /// including one trailing whitespace separator if present.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        let end = self
            .patterns
            .iter()
            .filter_map(|re| re.find(text))
            .map(|m| m.end())
            .filter(|&end| end > 0)
            .max()?;

        let separator = text[end..]
            .chars()
            .next()
            .filter(|c| c.is_whitespace())
            .map_or(0, char::len_utf8);
        Some(end + separator)
    }

    /// Remove every prefix that starts a line of `text`.
    ///
    /// `at_line_start` tells whether the first byte of `text` begins a line in
    /// the enclosing string. Prefixes repeated at the same line start are all
    /// removed so a second pass finds nothing. Returns `None` when nothing
    /// matched.
    pub fn strip(&self, text: &str, at_line_start: bool) -> Option<(String, usize)> {
        let mut out = String::with_capacity(text.len());
        let mut removed = 0;
        let mut rest = text;
        let mut line_start = at_line_start;

        loop {
            if line_start {
                while let Some(len) = self.match_len(rest) {
                    rest = &rest[len..];
                    removed += 1;
                }
            }
            match rest.find('\n') {
                Some(i) => {
                    out.push_str(&rest[..=i]);
                    rest = &rest[i + 1..];
                    line_start = true;
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }

        (removed > 0).then_some((out, removed))
    }
}
