//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the request URL, match a route, adapt the request, invoke the
//!   handler and write its response
//! - Map every request-scoped failure onto an HTTP status
//! - Hold the live route generation behind an atomically swappable handle
//!
//! # Request State Machine
//! ```text
//! ReceiveURL → MatchRoute → AdaptRequest → InvokeHandler → WriteResponse
//!     │            │             │               │
//!     └─ 500       └─ 404        └─ 500          └─ 500 (logged, server stays up)
//! ```
//!
//! # Design Decisions
//! - The generation is loaded once, at match time, and held until the
//!   response body is written; a concurrent reload never changes it
//! - Handler panics are caught and treated like returned errors
//! - Error responses carry a status and no body

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::FutureExt;
use thiserror::Error;

use crate::http::handler::HandlerError;
use crate::http::request::{adapt_request, parse_request_url, RequestError};
use crate::http::response::{self, Response};
use crate::net::connection::InFlightTracker;
use crate::observability::metrics;
use crate::reload::Generation;

/// A request-scoped dispatch failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target could not be turned into a URL.
    #[error(transparent)]
    BadRequestUrl(RequestError),

    /// No route matched the method and path.
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// The matched request could not be adapted (body read failure).
    #[error(transparent)]
    Adapt(RequestError),

    /// The handler failed, panicked or timed out.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    /// Status written for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::BadRequestUrl(_)
            | DispatchError::Adapt(_)
            | DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Swappable handle to the dispatcher serving a listener.
///
/// Reloads install through the handle, so they follow a replaced dispatcher.
pub type SharedDispatcher = Arc<ArcSwap<Dispatcher>>;

/// Dispatches requests against the live route generation.
pub struct Dispatcher {
    generation: ArcSwap<Generation>,
    handler_timeout: Option<Duration>,
    in_flight: InFlightTracker,
}

impl Dispatcher {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation: ArcSwap::from_pointee(generation),
            handler_timeout: None,
            in_flight: InFlightTracker::new(),
        }
    }

    /// Bound handler execution time; `None` leaves handlers unbounded.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// The generation new requests are matched against.
    pub fn current(&self) -> Arc<Generation> {
        self.generation.load_full()
    }

    /// Atomically replace the live generation, returning the previous one.
    ///
    /// Requests that already matched keep the generation they loaded.
    pub fn install(&self, generation: Generation) -> Arc<Generation> {
        let generation = Arc::new(generation);
        metrics::set_generation(generation.id());
        self.generation.swap(generation)
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    /// Serve one request, always producing a transport response.
    pub async fn handle(&self, request: Request<Body>) -> axum::response::Response {
        let guard = self.in_flight.track();
        let start = Instant::now();
        let method = request.method().clone();

        let response = match self.dispatch(request).await {
            Ok((response, generation)) => {
                tracing::debug!(
                    request = %guard.seq(),
                    generation = generation.id(),
                    status = response.status().as_u16(),
                    "Request dispatched"
                );
                response.into_transport((generation, guard))
            }
            Err(err) => {
                match &err {
                    DispatchError::RouteNotFound { .. } => {
                        tracing::warn!(request = %guard.seq(), error = %err, "No route matched")
                    }
                    _ => tracing::error!(request = %guard.seq(), error = %err, "Request failed"),
                }
                response::status_only(err.status())
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    /// Run the request state machine, returning the handler's response and
    /// the generation it was served from.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
    ) -> Result<(Response, Arc<Generation>), DispatchError> {
        // ReceiveURL
        let url = parse_request_url(request.uri(), request.headers())
            .map_err(DispatchError::BadRequestUrl)?;

        // MatchRoute: the only read of the live handle for this request.
        let generation = self.current();
        let Some(route) = generation.table().find(request.method(), url.path()) else {
            return Err(DispatchError::RouteNotFound {
                method: request.method().to_string(),
                path: url.path().to_string(),
            });
        };

        // AdaptRequest
        let normalized = adapt_request(request, url, route)
            .await
            .map_err(DispatchError::Adapt)?;

        // InvokeHandler
        let handler = route.handler.clone();
        let invocation = AssertUnwindSafe(async move { handler.call(normalized).await })
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(result) => result,
                Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
            });

        let response = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or(Err(HandlerError::TimedOut(limit)))?,
            None => invocation.await?,
        };

        Ok((response, generation))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("generation", &self.current().id())
            .field("handler_timeout", &self.handler_timeout)
            .field("in_flight", &self.in_flight.active_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::RouteModule;
    use crate::http::handler::{handler_fn, Handler};
    use crate::routing::{RouteMethod, RoutePath};
    use axum::http::header::HOST;
    use axum::http::Method;
    use tokio::sync::oneshot;

    fn module(method: RouteMethod, path: &str, handler: Handler) -> RouteModule {
        RouteModule::new(
            format!("routes{path}.toml"),
            method,
            RoutePath::compile(path).unwrap(),
            handler,
        )
    }

    fn text_route(method: RouteMethod, path: &str, body: &'static str) -> RouteModule {
        module(
            method,
            path,
            handler_fn(move |_req| async move { Ok(Response::ok().text(body)) }),
        )
    }

    fn dispatcher(modules: Vec<RouteModule>) -> Dispatcher {
        Dispatcher::new(Generation::from_modules(1, modules).unwrap())
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, "localhost:3000")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_no_routes_is_not_found() {
        let dispatcher = Dispatcher::new(Generation::empty());
        let response = dispatcher.handle(request(Method::GET, "/", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_echo_post_body() {
        let echo = handler_fn(|req| async move {
            let body = req.body().cloned().unwrap_or_default();
            Ok(Response::ok().bytes(body))
        });
        let dispatcher = dispatcher(vec![module(RouteMethod::Post, "/echo", echo)]);

        let response = dispatcher
            .handle(request(Method::POST, "/echo", "hello"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_path_params_reach_handler() {
        let show = handler_fn(|req| async move {
            let id = req.param("id").unwrap_or("?").to_string();
            Ok(Response::ok().text(id))
        });
        let dispatcher = dispatcher(vec![module(RouteMethod::Get, "/users/:id", show)]);

        let response = dispatcher
            .handle(request(Method::GET, "/users/42", ""))
            .await;
        assert_eq!(body_string(response).await, "42");
    }

    #[tokio::test]
    async fn test_handler_failure_is_contained() {
        let boom = handler_fn(|_req| async { Err(HandlerError::msg("boom")) });
        let dispatcher = dispatcher(vec![
            module(RouteMethod::Get, "/boom", boom),
            text_route(RouteMethod::Get, "/ok", "fine"),
        ]);

        let failed = dispatcher.handle(request(Method::GET, "/boom", "")).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(failed).await, "");

        let ok = dispatcher.handle(request(Method::GET, "/ok", "")).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_string(ok).await, "fine");
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let panics = handler_fn(|_req| async {
            if true {
                panic!("handler exploded");
            }
            Ok(Response::ok())
        });
        let dispatcher = dispatcher(vec![
            module(RouteMethod::Get, "/panic", panics),
            text_route(RouteMethod::Get, "/ok", "fine"),
        ]);

        let err = dispatcher
            .dispatch(request(Method::GET, "/panic", ""))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, DispatchError::Handler(HandlerError::Panicked(msg)) if msg == "handler exploded")
        );

        let ok = dispatcher.handle(request(Method::GET, "/ok", "")).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_host_is_server_error() {
        let dispatcher = dispatcher(vec![text_route(RouteMethod::Get, "/a", "a")]);
        let req = Request::builder()
            .uri("/a")
            .header(HOST, "bad host")
            .body(Body::empty())
            .unwrap();

        let err = dispatcher.dispatch(req).await.unwrap_err();
        assert!(matches!(err, DispatchError::BadRequestUrl(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_method_mismatch_is_not_found() {
        let dispatcher = dispatcher(vec![text_route(RouteMethod::Get, "/a", "a")]);
        let response = dispatcher.handle(request(Method::POST, "/a", "x")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_status_and_headers_transcribed() {
        let teapot = handler_fn(|_req| async {
            Ok(Response::new(StatusCode::IM_A_TEAPOT)
                .with_status_text("Short And Stout")
                .header(
                    axum::http::HeaderName::from_static("x-kind"),
                    axum::http::HeaderValue::from_static("teapot"),
                ))
        });
        let dispatcher = dispatcher(vec![module(RouteMethod::Get, "/tea", teapot)]);

        let response = dispatcher.handle(request(Method::GET, "/tea", "")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()["x-kind"], "teapot");
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout() {
        let slow = handler_fn(|_req| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Response::ok())
        });
        let dispatcher = dispatcher(vec![module(RouteMethod::Get, "/slow", slow)])
            .with_handler_timeout(Some(Duration::from_secs(1)));

        let err = dispatcher
            .dispatch(request(Method::GET, "/slow", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler(HandlerError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_reload_does_not_affect_in_flight_request() {
        let (entered_tx, entered_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let gate = Arc::new(std::sync::Mutex::new(Some((entered_tx, release_rx))));

        let old = handler_fn(move |_req| {
            let gate = gate.lock().unwrap().take();
            async move {
                if let Some((entered, release)) = gate {
                    let _ = entered.send(());
                    let _ = release.await;
                }
                Ok(Response::ok().text("old"))
            }
        });
        let dispatcher = Arc::new(dispatcher(vec![module(RouteMethod::Get, "/v", old)]));

        let in_flight = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.handle(request(Method::GET, "/v", "")).await })
        };
        entered_rx.await.unwrap();

        let previous = dispatcher.install(
            Generation::from_modules(2, vec![text_route(RouteMethod::Get, "/v", "new")]).unwrap(),
        );
        assert_eq!(previous.id(), 1);
        drop(previous);

        let fresh = dispatcher.handle(request(Method::GET, "/v", "")).await;
        assert_eq!(body_string(fresh).await, "new");

        release_tx.send(()).unwrap();
        let response = in_flight.await.unwrap();
        assert_eq!(body_string(response).await, "old");
    }

    #[tokio::test]
    async fn test_superseded_generation_released_after_body_written() {
        let dispatcher = dispatcher(vec![text_route(RouteMethod::Get, "/a", "a")]);
        let first = Arc::downgrade(&dispatcher.current());

        let response = dispatcher.handle(request(Method::GET, "/a", "")).await;
        dispatcher.install(Generation::empty());
        assert!(first.upgrade().is_some(), "response body still pending");
        assert_eq!(dispatcher.in_flight().active_count(), 1);

        assert_eq!(body_string(response).await, "a");
        assert!(first.upgrade().is_none());
        assert_eq!(dispatcher.in_flight().active_count(), 0);
    }
}
