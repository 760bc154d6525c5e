//! The build pipeline boundary.
//!
//! The dev server does not care how route source turns into something it can
//! call. A [`BuildPipeline`] discovers route sources, compiles every one of
//! them into a [`RouteModule`] and signals when sources change.

use std::any::Any;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::build::BuildError;
use crate::http::handler::Handler;
use crate::routing::{RouteEntry, RouteMethod, RoutePath};

/// A compiled route source: one method, one path, one handler.
#[derive(Clone)]
pub struct RouteModule {
    source: PathBuf,
    method: RouteMethod,
    path: RoutePath,
    handler: Handler,
}

impl RouteModule {
    pub fn new(
        source: impl Into<PathBuf>,
        method: RouteMethod,
        path: RoutePath,
        handler: Handler,
    ) -> Self {
        Self {
            source: source.into(),
            method,
            path,
            handler,
        }
    }

    /// The source file this module was compiled from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The route table entry backed by this module.
    pub fn entry(&self) -> RouteEntry {
        RouteEntry::new(self.method, self.path.clone(), self.handler.clone())
    }
}

impl std::fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteModule")
            .field("source", &self.source)
            .field("method", &self.method)
            .field("path", &self.path.raw())
            .finish_non_exhaustive()
    }
}

/// A change notification from a watched route source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Files touched by the change, when the watcher reports them.
    pub paths: Vec<PathBuf>,
}

/// Stream of change notifications.
pub type ChangeStream = mpsc::UnboundedReceiver<ChangeEvent>;

/// Keeps a watch alive; dropping it (or calling [`WatchHandle::dispose`]) stops it.
pub struct WatchHandle {
    guard: Option<Box<dyn Any + Send>>,
}

impl WatchHandle {
    /// Tie the watch's lifetime to `guard`.
    pub fn new(guard: impl Any + Send) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }

    /// A handle with nothing to release.
    pub fn detached() -> Self {
        Self { guard: None }
    }

    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    /// Stop watching.
    pub fn dispose(mut self) {
        if self.guard.take().is_some() {
            tracing::debug!("Route watch disposed");
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Discovers, compiles and watches route sources.
///
/// Methods are blocking; async callers run them on the blocking pool.
pub trait BuildPipeline: Send + Sync + 'static {
    /// Route source files, in discovery order.
    fn discover(&self) -> Result<Vec<PathBuf>, BuildError>;

    /// Watch `paths` (and wherever new sources may appear) for changes.
    fn watch(&self, paths: &[PathBuf]) -> Result<(ChangeStream, WatchHandle), BuildError>;

    /// Compile every current route source, in discovery order.
    ///
    /// Fails as a whole on the first source that does not compile.
    fn compile_all(&self) -> Result<Vec<RouteModule>, BuildError>;
}
