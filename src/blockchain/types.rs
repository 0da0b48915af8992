//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export the connection config from the config module to avoid duplication
pub use crate::config::schema::ChainConnectionConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Stage of a submission at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitPhase {
    Estimating,
    Pricing,
    NonceAllocation,
    Broadcasting,
}

impl std::fmt::Display for SubmitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            SubmitPhase::Estimating => "estimating",
            SubmitPhase::Pricing => "pricing",
            SubmitPhase::NonceAllocation => "nonce allocation",
            SubmitPhase::Broadcasting => "broadcasting",
        };
        f.write_str(phase)
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Missing or invalid startup configuration (RPC URL, private key).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Signing failed before anything reached the node.
    #[error("Signer error: {0}")]
    Signer(String),

    /// Unknown alias and not a raw address.
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    /// Method name absent from the contract ABI.
    #[error("Method '{method}' not found on contract {contract}")]
    MethodNotFound { contract: String, method: String },

    /// Event name absent from the contract ABI.
    #[error("Event '{event}' not found on contract {contract}")]
    EventNotFound { contract: String, event: String },

    /// ABI parsing, encoding or decoding failed.
    #[error("ABI error: {0}")]
    Abi(String),

    /// A read-only call reverted or the node rejected it.
    #[error("Call to {method}({args}) failed: {reason}")]
    ContractCall {
        method: String,
        args: String,
        reason: String,
    },

    /// Signing or broadcasting a transaction failed.
    #[error("Submitting {method}({args}) to {target} failed while {phase}: {reason}")]
    Submit {
        phase: SubmitPhase,
        method: String,
        args: String,
        target: Address,
        reason: String,
    },

    /// Confirmation wait exceeded; the transaction may still be mined.
    #[error("Transaction {hash} not confirmed within {timeout_ms} ms")]
    ConfirmationTimeout { hash: TxHash, timeout_ms: u64 },

    /// Transaction was mined but reverted on-chain.
    #[error("Transaction {hash} reverted in block {block_number}")]
    Reverted { hash: TxHash, block_number: u64 },

    /// Replacement target is unknown locally and to the node.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TxHash),

    /// Replacement target already has a receipt.
    #[error("Transaction already mined: {0}")]
    AlreadyMined(TxHash),

    /// Replacement target was sent by a different account.
    #[error("Transaction {0} was not sent by this signer")]
    NotOwnTransaction(TxHash),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// A batch stopped at `index`; earlier entries were already broadcast.
    #[error("Batch aborted at index {index} after {} submitted: {source}", submitted.len())]
    Batch {
        index: usize,
        submitted: Vec<TxHash>,
        #[source]
        source: Box<BlockchainError>,
    },
}

/// Flat discriminant of [`BlockchainError`] for retry policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Rpc,
    Signer,
    ContractNotFound,
    Abi,
    ContractCall,
    Submit,
    ConfirmationTimeout,
    Reverted,
    TransactionNotFound,
    AlreadyMined,
    NotOwnTransaction,
    GasPriceTooHigh,
    Batch,
}

impl BlockchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlockchainError::Configuration(_) | BlockchainError::ChainMismatch { .. } => {
                ErrorKind::Configuration
            }
            BlockchainError::Rpc(_) => ErrorKind::Rpc,
            BlockchainError::Signer(_) => ErrorKind::Signer,
            BlockchainError::ContractNotFound(_) => ErrorKind::ContractNotFound,
            BlockchainError::MethodNotFound { .. }
            | BlockchainError::EventNotFound { .. }
            | BlockchainError::Abi(_) => ErrorKind::Abi,
            BlockchainError::ContractCall { .. } => ErrorKind::ContractCall,
            BlockchainError::Submit { .. } => ErrorKind::Submit,
            BlockchainError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            BlockchainError::Reverted { .. } => ErrorKind::Reverted,
            BlockchainError::TransactionNotFound(_) => ErrorKind::TransactionNotFound,
            BlockchainError::AlreadyMined(_) => ErrorKind::AlreadyMined,
            BlockchainError::NotOwnTransaction(_) => ErrorKind::NotOwnTransaction,
            BlockchainError::GasPriceTooHigh { .. } => ErrorKind::GasPriceTooHigh,
            BlockchainError::Batch { .. } => ErrorKind::Batch,
        }
    }

    /// Whether the caller may safely repeat the operation as-is.
    ///
    /// Reads and confirmation waits are idempotent. Sends are not: a submit
    /// failure may still have reached the mempool.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Rpc | ErrorKind::ConfirmationTimeout | ErrorKind::GasPriceTooHigh
        )
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
