//! Listening socket ownership.
//!
//! # Responsibilities
//! - Bind the configured port, moving to the next port while it is taken
//! - Serve every request through the live [`Dispatcher`]
//! - Swap the dispatcher without rebinding
//! - Stop accepting on shutdown and drain what is in flight
//!
//! # Design Decisions
//! - Only `AddrInUse` is retried; any other bind failure is fatal
//! - The dispatcher handle is read once per request

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ListenerConfig;
use crate::http::{Dispatcher, SharedDispatcher};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("every port from {start} to 65535 is in use")]
    PortsExhausted { start: u16 },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Bind `host:port`, trying successive ports while the address is in use.
pub async fn bind_with_retry(
    host: &str,
    port: u16,
    retry_delay: Duration,
) -> Result<TcpListener, ListenerError> {
    let start = port;
    let mut port = port;

    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port
                    .checked_add(1)
                    .ok_or(ListenerError::PortsExhausted { start })?;
                tracing::warn!(
                    port,
                    next,
                    retry_delay_ms = retry_delay.as_millis() as u64,
                    "Port in use, retrying on next port"
                );
                tokio::time::sleep(retry_delay).await;
                port = next;
            }
            Err(source) => {
                return Err(ListenerError::Bind {
                    address: format!("{host}:{port}"),
                    source,
                })
            }
        }
    }
}

/// Owns the bound socket and the server task accepting on it.
pub struct ListenerManager {
    local_addr: SocketAddr,
    dispatcher: SharedDispatcher,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<io::Result<()>>,
}

impl ListenerManager {
    /// Bind per `config` and start serving through `dispatcher`.
    pub async fn bind(
        config: &ListenerConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, ListenerError> {
        let listener = bind_with_retry(&config.host, config.port, config.retry_delay()).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: format!("{}:{}", config.host, config.port),
            source,
        })?;

        tracing::info!(address = %local_addr, "dev server is running on: http://{local_addr}");

        let dispatcher: SharedDispatcher = Arc::new(ArcSwap::new(dispatcher));
        let app = build_router(Arc::clone(&dispatcher));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await
        });

        Ok(Self {
            local_addr,
            dispatcher,
            shutdown_tx,
            task,
        })
    }

    /// The address actually bound, after any port retries.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The dispatcher currently serving requests.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.load_full()
    }

    /// The swappable handle requests are served through.
    pub fn dispatcher_handle(&self) -> SharedDispatcher {
        Arc::clone(&self.dispatcher)
    }

    /// Route subsequent requests through `dispatcher`, returning the old one.
    ///
    /// Reloads installed through [`ListenerManager::dispatcher_handle`]
    /// land in the replacement.
    pub fn replace_handler(&self, dispatcher: Arc<Dispatcher>) -> Arc<Dispatcher> {
        tracing::debug!(address = %self.local_addr, "Dispatcher replaced");
        self.dispatcher.swap(dispatcher)
    }

    /// Stop accepting, then wait for in-flight requests to finish.
    pub async fn shutdown(self) -> Result<(), ListenerError> {
        let dispatcher = self.dispatcher.load_full();
        tracing::info!(
            address = %self.local_addr,
            in_flight = dispatcher.in_flight().active_count(),
            "Listener shutting down"
        );

        let _ = self.shutdown_tx.send(true);
        let served = self
            .task
            .await
            .map_err(|e| ListenerError::Serve(io::Error::other(e)))?;

        dispatcher.in_flight().wait_idle().await;
        tracing::info!(address = %self.local_addr, "Listener stopped");
        served.map_err(ListenerError::Serve)
    }
}

fn build_router(dispatcher: SharedDispatcher) -> Router {
    Router::new()
        .fallback(serve_request)
        .with_state(dispatcher)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn serve_request(
    State(dispatcher): State<SharedDispatcher>,
    request: Request<Body>,
) -> axum::response::Response {
    let dispatcher = dispatcher.load_full();
    dispatcher.handle(request).await
}
