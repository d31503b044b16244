//! Target lookup.
//!
//! # Responsibilities
//! - Store compiled targets
//! - Decide whether a request body is normalized
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan (a handful of inference endpoints)
//! - First match wins, in configuration order

use axum::body::Body;
use axum::http::{Method, Request};

use crate::config::TargetConfig;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathMatcher};

/// A compiled target.
#[derive(Debug)]
pub struct Target {
    pub name: String,
    matcher: AndMatcher,
}

/// Compiled set of targets.
#[derive(Debug, Default)]
pub struct Router {
    targets: Vec<Target>,
}

impl Router {
    /// Compile targets from configuration.
    ///
    /// Methods that do not parse are skipped; validation rejects them earlier.
    pub fn from_config(configs: &[TargetConfig]) -> Self {
        let targets = configs
            .iter()
            .map(|config| {
                let methods = config
                    .methods
                    .iter()
                    .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
                    .collect();
                Target {
                    name: config.name.clone(),
                    matcher: AndMatcher::new(vec![
                        Box::new(PathMatcher::new(config.path.clone())),
                        Box::new(MethodMatcher::new(methods)),
                    ]),
                }
            })
            .collect();

        Self { targets }
    }

    /// Find the target a request belongs to, if any.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Target> {
        self.targets.iter().find(|t| t.matcher.matches(req))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
