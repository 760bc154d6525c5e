//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup in discovery order)
//!     → matcher.rs (exact comparison or segment captures)
//!     → Return: matched RouteEntry or no match
//!
//! Route Compilation (build and every reload):
//!     RouteModule[] (from the build pipeline)
//!     → Compile path patterns
//!     → Reject duplicate (method, path) pairs
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Tables are compiled once per generation, immutable at runtime
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (discovery order)

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PatternError, RoutePath};
pub use router::{DuplicateRouteError, RouteEntry, RouteMethod, RouteTable};
