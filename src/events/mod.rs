//! Contract event subscriptions.
//!
//! # Data Flow
//! ```text
//! subscribe(target, event, callback)
//!     → registry.rs (one listener task per address+event key)
//!     → listener.rs (poll eth_blockNumber + eth_getLogs from a cursor)
//!     → types.rs (decode topics and data into a NormalizedEvent)
//!     → callback, or the outbound broadcast channel for core events
//! ```
//!
//! Handler errors and panics are logged and swallowed; a listener only stops
//! when it is unsubscribed or torn down.

pub mod listener;
pub mod registry;
pub mod types;

pub use listener::block_ranges;
pub use registry::EventSubscriptionRegistry;
pub use types::{
    normalize_log, EventArg, EventCallback, HandlerError, NormalizedEvent, SubscriptionKey,
};
