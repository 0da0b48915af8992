//! Transaction request, record and result types.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, BlockHash, Bytes, TxHash, U256};
use alloy::rpc::types::{Log, TransactionReceipt};
use serde::{Deserialize, Serialize};

use crate::blockchain::client::FeeQuote;

/// Caller-supplied gas values. Any field left unset is resolved from chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasOverrides {
    /// Skips estimation when set.
    pub gas_limit: Option<u64>,
    /// Skips the fee quote when set (sent as legacy `gasPrice`).
    pub gas_price: Option<u128>,
}

/// A contract write to submit through the signer.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Catalog alias or raw address.
    pub target: String,
    /// Human-readable ABI overriding the catalog one.
    pub abi: Option<Vec<String>>,
    pub method: String,
    pub args: Vec<DynSolValue>,
    pub value: U256,
    pub gas: GasOverrides,
}

impl CallRequest {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            abi: None,
            method: method.into(),
            args: Vec::new(),
            value: U256::ZERO,
            gas: GasOverrides::default(),
        }
    }

    pub fn with_args(mut self, args: Vec<DynSolValue>) -> Self {
        self.args = args;
        self
    }

    pub fn with_abi<S: Into<String>>(mut self, signatures: impl IntoIterator<Item = S>) -> Self {
        self.abi = Some(signatures.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas.gas_price = Some(gas_price);
        self
    }
}

/// Lifecycle of a transaction handled by the manager.
///
/// `Built` and `Estimating` are transient and never stored; a record starts
/// at `Submitted` (pending) and ends in one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Built,
    Estimating,
    Submitted,
    Confirmed,
    Failed,
    Replaced,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Confirmed | TransactionState::Failed | TransactionState::Replaced
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            TransactionState::Built => "BUILT",
            TransactionState::Estimating => "ESTIMATING",
            TransactionState::Submitted => "PENDING",
            TransactionState::Confirmed => "CONFIRMED",
            TransactionState::Failed => "FAILED",
            TransactionState::Replaced => "REPLACED",
        };
        f.write_str(state)
    }
}

/// In-memory record of a broadcast transaction. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fee: FeeQuote,
    pub value: U256,
    pub input: Bytes,
    /// Method label used in errors and logs.
    pub method: String,
    /// Unix seconds.
    pub submitted_at: u64,
    pub state: TransactionState,
    /// Hash of the transaction that superseded this one.
    pub replaced_by: Option<TxHash>,
}

impl PendingTransaction {
    pub fn result(&self) -> TransactionResult {
        TransactionResult {
            hash: self.hash,
            from: self.from,
            to: self.to,
            value: self.value,
            gas_limit: self.gas_limit,
            gas_price: self.fee.effective_gas_price(),
            fee: self.fee,
            nonce: self.nonce,
        }
    }
}

/// What a successful submit returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
    /// Legacy price, or max fee per gas for fee-market transactions.
    pub gas_price: u128,
    pub fee: FeeQuote,
    pub nonce: u64,
}

/// Caller-facing view of a mined receipt.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReceiptView {
    pub hash: TxHash,
    pub block_number: u64,
    pub block_hash: Option<BlockHash>,
    pub gas_used: u64,
    /// 1 for success, 0 for revert.
    pub status: u8,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

impl TransactionReceiptView {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

impl From<&TransactionReceipt> for TransactionReceiptView {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            block_hash: receipt.block_hash,
            gas_used: receipt.gas_used,
            status: u8::from(receipt.status()),
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            logs: receipt.inner.logs().to_vec(),
        }
    }
}

/// On-chain outcome as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnChainStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Result of a status lookup.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStatus {
    pub hash: TxHash,
    pub status: OnChainStatus,
    /// Zero while pending.
    pub confirmations: u64,
    pub receipt: Option<TransactionReceiptView>,
}

/// Gas cost preview for a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostEstimate {
    pub gas_estimate: u64,
    pub gas_price: u128,
    pub total_wei: U256,
    /// `total_wei` rendered in ether.
    pub total_eth: String,
}

impl CostEstimate {
    pub fn new(gas_estimate: u64, gas_price: u128) -> Self {
        let total_wei = U256::from(gas_estimate) * U256::from(gas_price);
        Self {
            gas_estimate,
            gas_price,
            total_wei,
            total_eth: alloy::primitives::utils::format_ether(total_wei),
        }
    }
}
