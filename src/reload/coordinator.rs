//! Reload coordination.
//!
//! # Responsibilities
//! - Consume change notifications from the build pipeline
//! - Collapse bursts into a single rebuild
//! - Compile a new generation and install it into the dispatcher
//! - Keep the current generation serving when a rebuild fails

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::build::{BuildPipeline, ChangeStream};
use crate::http::{Dispatcher, SharedDispatcher};
use crate::observability::metrics;
use crate::reload::{Debouncer, Generation, ReloadError};

pub struct ReloadCoordinator<P: BuildPipeline> {
    pipeline: Arc<P>,
    dispatcher: SharedDispatcher,
    debouncer: Debouncer,
}

impl<P: BuildPipeline> ReloadCoordinator<P> {
    /// Install reloads through `dispatcher`, following it if it is replaced.
    pub fn new(pipeline: Arc<P>, dispatcher: SharedDispatcher, debounce: Duration) -> Self {
        Self {
            pipeline,
            dispatcher,
            debouncer: Debouncer::new(debounce),
        }
    }

    /// Install reloads into one fixed dispatcher.
    pub fn for_dispatcher(
        pipeline: Arc<P>,
        dispatcher: Arc<Dispatcher>,
        debounce: Duration,
    ) -> Self {
        Self::new(pipeline, Arc::new(ArcSwap::new(dispatcher)), debounce)
    }

    /// The dispatcher the next reload installs into.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.load_full()
    }

    /// Compile the next generation and install it.
    ///
    /// On error nothing is installed and the current generation keeps serving.
    pub async fn reload(&self) -> Result<Arc<Generation>, ReloadError> {
        let id = self.dispatcher().current().id() + 1;
        let pipeline = Arc::clone(&self.pipeline);

        let generation =
            tokio::task::spawn_blocking(move || Generation::compile(pipeline.as_ref(), id))
                .await??;

        let routes = generation.table().len();
        // Reloaded so a dispatcher replaced mid-build still receives it.
        let dispatcher = self.dispatcher();
        let previous = dispatcher.install(generation);
        tracing::info!(
            generation = id,
            previous = previous.id(),
            routes,
            "Routes reloaded"
        );
        Ok(dispatcher.current())
    }

    /// Reload, logging the outcome instead of returning it.
    async fn rebuild(&self) {
        match self.reload().await {
            Ok(_) => metrics::record_reload("success"),
            Err(e) => {
                metrics::record_reload("failed");
                tracing::error!(
                    error = %e,
                    generation = self.dispatcher().current().id(),
                    "Reload failed, keeping current routes"
                );
            }
        }
    }

    /// Drive reloads until the change stream closes or shutdown is signalled.
    ///
    /// A rebuild already scheduled when the stream closes still runs.
    pub async fn run(mut self, mut changes: ChangeStream, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            debounce_ms = self.debouncer.window().as_millis() as u64,
            "Reload coordinator started"
        );

        let mut stream_open = true;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("Reload coordinator received shutdown signal");
                    break;
                }
                event = changes.recv(), if stream_open => match event {
                    Some(event) => {
                        tracing::debug!(paths = ?event.paths, "Route source changed");
                        self.debouncer.notify();
                    }
                    None => {
                        stream_open = false;
                        if !self.debouncer.is_pending() {
                            break;
                        }
                    }
                },
                _ = self.debouncer.fired() => {
                    self.rebuild().await;
                    if !stream_open {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reload coordinator stopped");
    }
}
