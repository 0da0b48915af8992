//! Transaction submission and tracking.
//!
//! # State Machine
//! ```text
//! BUILT → ESTIMATING → SUBMITTED → CONFIRMED
//!                                → FAILED    (mined, reverted)
//!                                → REPLACED  (superseded by speed-up/cancel)
//! ```
//!
//! Records live in memory only. Durability is the caller's concern.

pub mod manager;
pub mod nonce;
pub mod types;

pub use manager::TransactionManager;
pub use nonce::NonceAllocator;
pub use types::{
    CallRequest, CostEstimate, GasOverrides, OnChainStatus, PendingTransaction,
    TransactionReceiptView, TransactionResult, TransactionState, TransactionStatus,
};
