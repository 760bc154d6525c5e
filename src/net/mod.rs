//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured host:port
//!     → listener.rs (bind, next port while in use)
//!     → axum serve loop (request id, trace layer)
//!     → connection.rs (in-flight tracking until the body is written)
//!     → Hand off to the Dispatcher
//! ```
//!
//! # Design Decisions
//! - The socket is bound once; reloads never rebind it
//! - Shutdown stops accepting first, then drains in-flight requests

pub mod connection;
pub mod listener;

pub use connection::{InFlightGuard, InFlightTracker, RequestSeq};
pub use listener::{bind_with_retry, ListenerError, ListenerManager};
