//! Build pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! routes/**/*.toml
//!     → manifest.rs (discover, parse, compile path, resolve handler)
//!     → registry.rs (named Rust handlers supplied by the embedding program)
//!     → RouteModule[] (discovery order)
//!
//! Watch mode:
//!     watcher.rs (notify) → ChangeEvent stream → reload coordinator
//! ```
//!
//! # Design Decisions
//! - The pipeline is a trait; the dev server only sees modules and events
//! - A build either yields every module or fails; never a partial set
//! - Errors name the source file they came from

use std::path::PathBuf;

use thiserror::Error;

use crate::routing::PatternError;

pub mod manifest;
pub mod pipeline;
pub mod registry;
pub mod watcher;

pub use manifest::ManifestPipeline;
pub use pipeline::{BuildPipeline, ChangeEvent, ChangeStream, RouteModule, WatchHandle};
pub use registry::HandlerRegistry;

/// Failure to discover, compile or watch route sources.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse route manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{}: unknown HTTP method {method:?}", path.display())]
    UnknownMethod { path: PathBuf, method: String },

    #[error("{}: {source}", path.display())]
    Pattern {
        path: PathBuf,
        source: PatternError,
    },

    #[error("{}: invalid response definition: {detail}", path.display())]
    InvalidResponse { path: PathBuf, detail: String },

    #[error("{}: no handler registered under {name:?}", path.display())]
    UnknownHandler { path: PathBuf, name: String },

    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}
