//! EVM gateway library.
//!
//! Contract reads, transaction submission and event subscriptions against a
//! single JSON-RPC node with a single signing key.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     EVM GATEWAY                       │
//!                 │                                                       │
//!   Business      │  ┌────────────┐   ┌──────────────┐   ┌────────────┐  │
//!   workflows ────┼─▶│ contracts  │──▶│ transactions │──▶│ blockchain │──┼──▶ JSON-RPC
//!                 │  │  registry  │   │   manager    │   │  client +  │  │     node
//!                 │  └────────────┘   └──────────────┘   │  signer    │  │
//!                 │         │                            └─────▲──────┘  │
//!                 │         ▼                                  │         │
//!   Callbacks /   │  ┌────────────┐   ┌──────────────┐         │         │
//!   broadcast ◀───┼──│   events   │◀──│   listener   │─────────┘         │
//!   channel       │  │  registry  │   │ (log polling)│                   │
//!                 │  └────────────┘   └──────────────┘                   │
//!                 │                                                       │
//!                 │  config · observability · lifecycle                   │
//!                 └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod events;
pub mod transactions;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use blockchain::{BlockchainError, BlockchainResult, ChainClient, ErrorKind, SignerContext};
pub use config::schema::GatewayConfig;
pub use contracts::ContractRegistry;
pub use events::{EventSubscriptionRegistry, NormalizedEvent};
pub use lifecycle::{Gateway, Shutdown};
pub use transactions::{CallRequest, TransactionManager};
