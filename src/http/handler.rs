//! Route handler contract.
//!
//! A handler takes a [`NormalizedRequest`] and resolves, possibly after
//! suspending, to a [`Response`] or a [`HandlerError`]. Handlers are stored
//! behind `Arc<dyn RouteHandler>` so a route table can be cloned and shared
//! across requests without copying the closure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::http::request::NormalizedRequest;
use crate::http::response::Response;

/// Failure reported by (or on behalf of) a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked while producing its response.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler did not finish within the configured bound.
    #[error("handler did not complete within {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Result type returned by route handlers.
pub type HandlerResult = Result<Response, HandlerError>;

/// Type-erased async route handler.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, req: NormalizedRequest) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(NormalizedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, req: NormalizedRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self)(req))
    }
}

/// Shared handle to a route handler.
pub type Handler = Arc<dyn RouteHandler>;

/// Wrap an async function or closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(NormalizedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}
