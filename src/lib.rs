//! Development HTTP server with file-defined routes and live reload.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Route sources and reloading
pub mod build;
pub mod reload;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::DevServerConfig;
pub use http::Dispatcher;
pub use lifecycle::{DevServer, Shutdown};
