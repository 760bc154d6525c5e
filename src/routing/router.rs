//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in discovery order
//! - Reject duplicate (method, path) registrations at construction
//! - Look up the matching route for a method and path
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks, replaced wholesale on reload)
//! - O(n) scan in discovery order, first match wins
//! - Methods compare exactly; only `ALL` matches every method

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use thiserror::Error;

use crate::http::handler::Handler;
use crate::routing::matcher::RoutePath;

/// HTTP method a route is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Matches every request method.
    All,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Head => "HEAD",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::All => "ALL",
        }
    }

    /// Returns true if a request with `method` may be served by this route.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            RouteMethod::All => true,
            other => other.as_str() == method.as_str(),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown method name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown route method {0:?}")]
pub struct UnknownMethod(pub String);

impl FromStr for RouteMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const METHODS: [RouteMethod; 8] = [
            RouteMethod::Get,
            RouteMethod::Post,
            RouteMethod::Put,
            RouteMethod::Patch,
            RouteMethod::Delete,
            RouteMethod::Head,
            RouteMethod::Options,
            RouteMethod::All,
        ];

        METHODS
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A single registered route.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: RouteMethod,
    pub path: RoutePath,
    pub handler: Handler,
}

impl RouteEntry {
    pub fn new(method: RouteMethod, path: RoutePath, handler: Handler) -> Self {
        Self {
            method,
            path,
            handler,
        }
    }

    /// Returns true if both the method and the path match.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.accepts(method) && self.path.is_match(path)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path.raw())
            .finish_non_exhaustive()
    }
}

/// Two routes were registered under the same method and raw path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate route: {method} {path}")]
pub struct DuplicateRouteError {
    pub method: RouteMethod,
    pub path: String,
}

/// An immutable, ordered set of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// A table with no routes; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from entries in discovery order.
    ///
    /// The first (method, raw path) collision aborts construction.
    pub fn build(
        entries: impl IntoIterator<Item = RouteEntry>,
    ) -> Result<Self, DuplicateRouteError> {
        let mut seen = HashSet::new();
        let mut table = Vec::new();

        for entry in entries {
            if !seen.insert((entry.method, entry.path.raw().to_string())) {
                return Err(DuplicateRouteError {
                    method: entry.method,
                    path: entry.path.raw().to_string(),
                });
            }
            table.push(entry);
        }

        Ok(Self { entries: table })
    }

    /// Find the first route matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.matches(method, path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }
}
