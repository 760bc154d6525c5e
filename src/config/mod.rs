//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DevServerConfig (validated, immutable)
//!     → CLI flags override individual fields
//!     → handed to listener, dispatcher, reload coordinator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only route sources hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DevServerConfig, DispatchConfig, ListenerConfig, LogFormat, ObservabilityConfig, RoutesConfig,
};
