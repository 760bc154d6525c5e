//! Route source watcher.

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::build::pipeline::{ChangeEvent, ChangeStream, WatchHandle};
use crate::build::BuildError;

/// Watches a routes directory for manifest changes.
pub struct RouteWatcher {
    root: PathBuf,
    extension: &'static str,
}

impl RouteWatcher {
    /// Watch `root` recursively for files with `extension`.
    pub fn new(root: &Path, extension: &'static str) -> Self {
        Self {
            root: root.to_path_buf(),
            extension,
        }
    }

    /// Start watching.
    ///
    /// `extra` lists sources outside the root that should be watched too.
    /// Returns the change stream and the handle that keeps the watch alive.
    pub fn run(self, extra: &[PathBuf]) -> Result<(ChangeStream, WatchHandle), BuildError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let extension = self.extension;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_source_change(&event.kind) {
                        return;
                    }
                    let paths: Vec<PathBuf> = event
                        .paths
                        .into_iter()
                        .filter(|p| is_source_path(p, extension))
                        .collect();
                    if paths.is_empty() {
                        return;
                    }
                    tracing::debug!(?paths, kind = ?event.kind, "Route source change detected");
                    let _ = tx.send(ChangeEvent { paths });
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )
        .map_err(|source| BuildError::Watch {
            path: self.root.clone(),
            source,
        })?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|source| BuildError::Watch {
                path: self.root.clone(),
                source,
            })?;

        for path in extra.iter().filter(|p| !p.starts_with(&self.root)) {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|source| BuildError::Watch {
                    path: path.clone(),
                    source,
                })?;
        }

        tracing::info!(path = ?self.root, "Route watcher started");
        Ok((rx, WatchHandle::new(watcher)))
    }
}

/// Directories and vanished paths count: a moved or removed directory
/// carries manifests with it. Only existing files of another type are ignored.
fn is_source_path(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|e| e == extension) || !path.is_file()
}

fn is_source_change(kind: &EventKind) -> bool {
    kind.is_create() || kind.is_modify() || kind.is_remove()
}
