//! Live reload subsystem.
//!
//! # Data Flow
//! ```text
//! build pipeline change events
//!     → coordinator.rs (receive, feed the debouncer)
//!     → debounce.rs (quiet window elapses → one trigger)
//!     → pipeline.compile_all() on the blocking pool
//!     → generation.rs (RouteTable + modules, duplicates rejected)
//!     → Dispatcher::install (atomic swap)
//! ```
//!
//! # Design Decisions
//! - A failed reload is logged and the previous generation keeps serving
//! - Generations are swapped by reference, never mutated
//! - A superseded generation is released with its last in-flight request

use thiserror::Error;

use crate::build::BuildError;
use crate::routing::DuplicateRouteError;

pub mod coordinator;
pub mod debounce;
pub mod generation;

pub use coordinator::ReloadCoordinator;
pub use debounce::Debouncer;
pub use generation::Generation;

/// Failure to produce a new generation.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateRouteError),

    #[error("build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
