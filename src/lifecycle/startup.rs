//! Startup orchestration.
//!
//! # Responsibilities
//! - Start watching route sources
//! - Build the first generation, applying the initial build policy
//! - Bind the listener and begin serving
//! - Run the reload coordinator
//!
//! # Design Decisions
//! - The watch starts before the first build so no edit falls between them
//! - An initial build failure is fatal unless empty routes are allowed
//! - Shutdown order: dispose watch, stop coordinator, drain listener

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::build::{BuildError, BuildPipeline, HandlerRegistry, ManifestPipeline, WatchHandle};
use crate::config::DevServerConfig;
use crate::http::Dispatcher;
use crate::lifecycle::Shutdown;
use crate::net::{ListenerError, ListenerManager};
use crate::observability::metrics;
use crate::reload::{Generation, ReloadCoordinator, ReloadError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to watch route sources: {0}")]
    Watch(#[from] BuildError),

    #[error("initial route build failed: {0}")]
    InitialBuild(#[from] ReloadError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Compile generation 1, or fall back to an empty table when allowed.
pub async fn initial_generation<P: BuildPipeline>(
    pipeline: Arc<P>,
    allow_empty_on_error: bool,
) -> Result<Generation, ReloadError> {
    let compiled =
        tokio::task::spawn_blocking(move || Generation::compile(pipeline.as_ref(), 1)).await?;

    match compiled {
        Ok(generation) => {
            for module in generation.modules() {
                tracing::debug!(
                    method = %module.method(),
                    path = module.path().raw(),
                    source = %module.source().display(),
                    "Route registered"
                );
            }
            tracing::info!(routes = generation.table().len(), "Initial routes built");
            Ok(generation)
        }
        Err(e) if allow_empty_on_error => {
            tracing::error!(error = %e, "Initial route build failed, serving no routes");
            Ok(Generation::empty())
        }
        Err(e) => Err(e),
    }
}

/// A running dev server: listener, watch and reload coordinator.
pub struct DevServer {
    listener: ListenerManager,
    watch: WatchHandle,
    coordinator: JoinHandle<()>,
    shutdown: Shutdown,
}

impl DevServer {
    /// Serve the manifests under `config.routes.dir`.
    pub async fn start(
        config: &DevServerConfig,
        registry: HandlerRegistry,
    ) -> Result<Self, StartupError> {
        let pipeline = ManifestPipeline::new(&config.routes.dir, registry);
        Self::start_with(config, Arc::new(pipeline)).await
    }

    /// Serve routes produced by any build pipeline.
    pub async fn start_with<P: BuildPipeline>(
        config: &DevServerConfig,
        pipeline: Arc<P>,
    ) -> Result<Self, StartupError> {
        let watcher = Arc::clone(&pipeline);
        let (changes, watch) = tokio::task::spawn_blocking(move || {
            let sources = watcher.discover()?;
            tracing::debug!(sources = sources.len(), "Route sources discovered");
            watcher.watch(&sources)
        })
        .await??;

        let generation =
            initial_generation(Arc::clone(&pipeline), config.routes.allow_empty_on_error).await?;
        let dispatcher = Arc::new(
            Dispatcher::new(generation).with_handler_timeout(config.dispatch.handler_timeout()),
        );
        metrics::set_generation(dispatcher.current().id());

        let listener = ListenerManager::bind(&config.listener, dispatcher).await?;

        let shutdown = Shutdown::new();
        let coordinator = ReloadCoordinator::new(
            pipeline,
            listener.dispatcher_handle(),
            config.routes.debounce(),
        );
        let coordinator = tokio::spawn(coordinator.run(changes, shutdown.subscribe()));

        Ok(Self {
            listener,
            watch,
            coordinator,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.listener.dispatcher()
    }

    pub fn listener(&self) -> &ListenerManager {
        &self.listener
    }

    /// Stop watching, stop reloading, then drain and close the listener.
    pub async fn shutdown(self) -> Result<(), ListenerError> {
        tracing::info!("Shutting down dev server");

        self.watch.dispose();
        self.shutdown.trigger();
        if let Err(e) = self.coordinator.await {
            tracing::warn!(error = %e, "Reload coordinator ended abnormally");
        }

        self.listener.shutdown().await
    }
}
