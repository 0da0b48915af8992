//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to the JSON-RPC endpoint and verify reachability
//! - Query chain state (block number, fees, balances, nonces, receipts)
//! - Estimate gas and execute read-only calls
//! - Surface every transport failure as a typed error, never retrying
//!
//! One client is shared by all subsystems. Reads are stateless and safe to
//! issue concurrently.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use alloy::consensus::TxEnvelope;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, Transaction, TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportErrorKind, TransportResult};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ChainConnectionConfig, ChainId,
};
use crate::observability::metrics;

/// Fee fields applied to an outgoing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeQuote {
    /// Pre-London `gasPrice`.
    Legacy { gas_price: u128 },
    /// EIP-1559 fee market.
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeQuote {
    /// Highest price per gas this quote may pay.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            FeeQuote::Legacy { gas_price } => *gas_price,
            FeeQuote::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }
}

/// Blockchain RPC client wrapper.
#[derive(Clone)]
pub struct ChainClient {
    /// Provider for the single configured node.
    provider: Arc<dyn Provider + Send + Sync>,
    /// Chain ID reported by the node at connect time.
    chain_id: ChainId,
    /// Endpoint, kept for diagnostics.
    rpc_url: String,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl ChainClient {
    /// Connect to the configured endpoint.
    ///
    /// # Errors
    /// `Configuration` when the URL is missing or malformed, `Rpc` when the
    /// node cannot be reached, `ChainMismatch` when it serves another chain.
    pub async fn connect(config: &ChainConnectionConfig) -> BlockchainResult<Self> {
        if config.rpc_url.trim().is_empty() {
            return Err(BlockchainError::Configuration(
                "rpc_url is required".to_string(),
            ));
        }
        let url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Configuration(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;

        let provider = ProviderBuilder::new().connect_http(url);
        Self::from_provider(Arc::new(provider), config).await
    }

    /// Wrap an already-built provider and verify the chain behind it.
    pub async fn from_provider(
        provider: Arc<dyn Provider + Send + Sync>,
        config: &ChainConnectionConfig,
    ) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs.max(1));

        let mut client = Self {
            provider,
            chain_id: ChainId(0),
            rpc_url: config.rpc_url.clone(),
            timeout_duration,
        };

        let chain_id = client.fetch_chain_id().await?;
        if let Some(expected) = config.chain_id {
            if expected != chain_id.0 {
                return Err(BlockchainError::ChainMismatch {
                    expected,
                    actual: chain_id.0,
                });
            }
        }
        client.chain_id = chain_id;

        tracing::info!(
            rpc_url = %client.rpc_url,
            chain_id = chain_id.0,
            "Blockchain client connected"
        );

        Ok(client)
    }

    /// Run one RPC under the configured deadline.
    async fn rpc<T, F>(&self, op: &'static str, call: F) -> BlockchainResult<T>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        match timeout(self.timeout_duration, call.into_future()).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                metrics::record_rpc_error(op);
                tracing::warn!(op, error = %e, "RPC error");
                Err(BlockchainError::Rpc(describe_rpc_error(&e)))
            }
            Err(_) => {
                metrics::record_rpc_error(op);
                tracing::warn!(op, "RPC timeout");
                Err(BlockchainError::Rpc(format!(
                    "{} timed out after {} seconds",
                    op,
                    self.timeout_duration.as_secs()
                )))
            }
        }
    }

    async fn fetch_chain_id(&self) -> BlockchainResult<ChainId> {
        let id = self.rpc("eth_chainId", self.provider.get_chain_id()).await?;
        Ok(ChainId(id))
    }

    /// Chain ID reported by the node at connect time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id.0
    }

    /// Get the latest block number.
    pub async fn block_number(&self) -> BlockchainResult<u64> {
        self.rpc("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    /// Current price per gas in wei.
    ///
    /// Falls back to the fee-market `maxFeePerGas` when the node does not
    /// serve a legacy gas price.
    pub async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(self.fee_quote().await?.effective_gas_price())
    }

    /// Fee fields for a transaction sent now.
    pub async fn fee_quote(&self) -> BlockchainResult<FeeQuote> {
        match self.rpc("eth_gasPrice", self.provider.get_gas_price()).await {
            Ok(gas_price) => Ok(FeeQuote::Legacy { gas_price }),
            Err(legacy_err) => {
                tracing::debug!(error = %legacy_err, "Legacy gas price unavailable, using fee history");
                let estimate = self
                    .rpc("eth_feeHistory", self.provider.estimate_eip1559_fees())
                    .await
                    .map_err(|_| legacy_err)?;
                Ok(FeeQuote::Eip1559 {
                    max_fee_per_gas: estimate.max_fee_per_gas,
                    max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
                })
            }
        }
    }

    /// Get the balance of an address.
    pub async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.rpc("eth_getBalance", self.provider.get_balance(address))
            .await
    }

    /// Next nonce for an address, counting pending transactions.
    pub async fn nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.rpc(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(address).pending(),
        )
        .await
    }

    /// Estimate gas units for a transaction request.
    pub async fn estimate_gas(&self, request: &TransactionRequest) -> BlockchainResult<u64> {
        self.rpc("eth_estimateGas", self.provider.estimate_gas(request.clone()))
            .await
    }

    /// Execute a read-only call against latest state.
    pub async fn call(&self, request: &TransactionRequest) -> BlockchainResult<Bytes> {
        self.rpc("eth_call", self.provider.call(request.clone())).await
    }

    /// Get a transaction receipt by hash.
    pub async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<TransactionReceipt>> {
        self.rpc(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }

    /// Get a transaction by hash.
    pub async fn transaction(&self, tx_hash: TxHash) -> BlockchainResult<Option<Transaction>> {
        self.rpc(
            "eth_getTransactionByHash",
            self.provider.get_transaction_by_hash(tx_hash),
        )
        .await
    }

    /// Fetch logs matching a filter.
    pub async fn logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.rpc("eth_getLogs", self.provider.get_logs(filter)).await
    }

    /// Broadcast a signed envelope. Only the signer calls this.
    pub(crate) async fn broadcast(&self, envelope: TxEnvelope) -> BlockchainResult<TxHash> {
        let pending = self
            .rpc("eth_sendRawTransaction", self.provider.send_tx_envelope(envelope))
            .await?;
        Ok(*pending.tx_hash())
    }

    /// Check if the node is reachable.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.block_number().await.is_ok();
        metrics::record_node_health(healthy);
        healthy
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id.0)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

/// Render an RPC failure, including a decoded revert reason when present.
pub(crate) fn describe_rpc_error(err: &RpcError<TransportErrorKind>) -> String {
    let revert = err
        .as_error_resp()
        .and_then(|payload| payload.as_revert_data())
        .and_then(|data| alloy::sol_types::decode_revert_reason(&data));

    match revert {
        Some(reason) => format!("{} (revert: {})", err, reason),
        None => err.to_string(),
    }
}
