//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! accepted connection (axum / hyper)
//!     → server.rs (Dispatcher: URL, route match, state machine)
//!     → request.rs (normalize headers, query, params, body)
//!     → handler.rs (route handler contract)
//!     → response.rs (transcribe status, headers, streamed body)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{handler_fn, Handler, HandlerError, HandlerResult, RouteHandler};
pub use request::{NormalizedRequest, QueryParams, RequestError};
pub use response::Response;
pub use server::{DispatchError, Dispatcher, SharedDispatcher};
