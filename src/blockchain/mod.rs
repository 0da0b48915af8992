//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key, RPC URL)
//!     → client.rs (RPC connection with timeouts, chain reads)
//!     → wallet.rs (key loading, signing, broadcast)
//!     → transactions/ (build, estimate, submit, confirm, replace)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - No implicit retries; every failure is surfaced to the caller

pub mod client;
pub mod types;
pub mod wallet;

pub use client::{ChainClient, FeeQuote};
pub use types::{BlockchainError, BlockchainResult, ChainId, ErrorKind, SubmitPhase};
pub use wallet::SignerContext;
