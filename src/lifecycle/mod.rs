//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → ChainClient → SignerContext → ContractRegistry
//!            → TransactionManager → EventSubscriptionRegistry
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast to long-running tasks → tear down listeners → exit
//! ```
//!
//! Any startup error is fatal; components are built in order, not
//! concurrently.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::Gateway;
