//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Watch sources → Initial build → Bind listener → Start reload coordinator
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger ordered shutdown
//!
//! Shutdown (shutdown.rs, startup.rs):
//!     Dispose watch → Stop coordinator → Stop accepting → Drain requests
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{wait_for_termination, TerminationSignal};
pub use startup::{initial_generation, DevServer, StartupError};
