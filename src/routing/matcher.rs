//! Route path compilation and matching.
//!
//! # Responsibilities
//! - Classify a raw path pattern as exact or parameterized
//! - Compile parameterized patterns into literal/capture segments
//! - Test candidate paths and extract named captures
//!
//! # Design Decisions
//! - Exact paths compare by string equality (case and trailing slash significant)
//! - A capture matches one or more non-`/` characters
//! - Malformed patterns are rejected when the route is built, never per request
//! - No regex: tagged segments give the same capture semantics

use std::collections::HashMap;

use thiserror::Error;

/// Prefix that turns a path segment into a named capture (`/users/:id`).
pub const PARAM_MARKER: char = ':';

/// Named values captured from a parameterized path.
pub type PathParams = HashMap<String, String>;

/// Error raised when a route path pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path pattern {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    #[error("path pattern {pattern:?} has an empty parameter name in segment {index}")]
    EmptyParameter { pattern: String, index: usize },

    #[error("path pattern {pattern:?} declares parameter {name:?} more than once")]
    DuplicateParameter { pattern: String, name: String },
}

// One `/`-delimited piece of a parameterized pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A compiled route path.
///
/// Exact paths carry no segments and match by literal equality. Parameterized
/// paths carry one segment per `/`-delimited piece of the raw pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    raw: String,
    segments: Option<Vec<Segment>>,
}

impl RoutePath {
    /// Compile a raw pattern such as `/users` or `/users/:id/posts/:postId`.
    pub fn compile(raw: impl Into<String>) -> Result<Self, PatternError> {
        let raw = raw.into();

        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw));
        }
        let rest = &raw[1..];

        // The root pattern has zero segments and is always exact.
        if rest.is_empty() || !rest.split('/').any(|s| s.starts_with(PARAM_MARKER)) {
            return Ok(Self { raw, segments: None });
        }

        let mut segments = Vec::new();
        for (index, segment) in rest.split('/').enumerate() {
            match segment.strip_prefix(PARAM_MARKER) {
                Some("") => {
                    return Err(PatternError::EmptyParameter {
                        pattern: raw.clone(),
                        index,
                    });
                }
                Some(name) => {
                    let seen = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Capture(n) if n == name));
                    if seen {
                        return Err(PatternError::DuplicateParameter {
                            pattern: raw.clone(),
                            name: name.to_string(),
                        });
                    }
                    segments.push(Segment::Capture(name.to_string()));
                }
                None => segments.push(Segment::Literal(segment.to_string())),
            }
        }

        Ok(Self {
            raw,
            segments: Some(segments),
        })
    }

    /// The pattern exactly as it was declared.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains no capture segments.
    pub fn is_exact_match(&self) -> bool {
        self.segments.is_none()
    }

    /// Names of the capture segments, in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flatten().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns true if `path` satisfies this pattern.
    pub fn is_match(&self, path: &str) -> bool {
        match &self.segments {
            None => self.raw == path,
            Some(segments) => Self::walk(segments, path, |_, _| {}),
        }
    }

    /// Match `path` and return its captures.
    ///
    /// Exact patterns yield an empty map on success.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        match &self.segments {
            None => (self.raw == path).then(PathParams::new),
            Some(segments) => {
                let mut params = PathParams::new();
                let matched = Self::walk(segments, path, |name, value| {
                    params.insert(name.to_string(), value.to_string());
                });
                matched.then_some(params)
            }
        }
    }

    // Anchored at both ends: every pattern segment consumes exactly one path
    // segment and nothing may remain.
    fn walk<'p>(
        segments: &[Segment],
        path: &'p str,
        mut on_capture: impl FnMut(&str, &'p str),
    ) -> bool {
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };

        let mut parts = rest.split('/');
        for segment in segments {
            let Some(part) = parts.next() else {
                return false;
            };
            match segment {
                Segment::Literal(literal) if literal != part => return false,
                Segment::Literal(_) => {}
                Segment::Capture(_) if part.is_empty() => return false,
                Segment::Capture(name) => on_capture(name, part),
            }
        }

        parts.next().is_none()
    }
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
