//! Transaction lifecycle: estimate, price, sign, broadcast, confirm, replace.
//!
//! # Responsibilities
//! - Build contract writes with a buffered gas estimate
//! - Quote fees at submit time and allocate nonces per signer
//! - Track broadcast transactions in memory until their nonce is mined
//! - Wait for confirmations and report on-chain status
//! - Speed up or cancel pending transactions by reusing their nonce
//!
//! Sends are never retried: a failed broadcast may still have reached the
//! mempool, so every failure is returned to the caller as-is.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use dashmap::DashMap;
use tokio::time::{interval, sleep, timeout};

use crate::blockchain::client::{ChainClient, FeeQuote};
use crate::blockchain::types::{BlockchainError, BlockchainResult, SubmitPhase};
use crate::blockchain::wallet::SignerContext;
use crate::config::schema::TransactionConfig;
use crate::contracts::abi::format_args;
use crate::contracts::registry::ContractRegistry;
use crate::observability::metrics;
use crate::transactions::nonce::NonceAllocator;
use crate::transactions::types::{
    CallRequest, CostEstimate, OnChainStatus, PendingTransaction, TransactionReceiptView,
    TransactionResult, TransactionState, TransactionStatus,
};

/// Gas limit sent = estimate × 120%, rounded up.
pub const GAS_LIMIT_BUFFER_PERCENT: u64 = 120;

/// Replacement fees = original × 110%, rounded up.
pub const REPLACEMENT_BUMP_PERCENT: u128 = 110;

/// Gas for a plain value transfer.
pub const CANCEL_GAS_LIMIT: u64 = 21_000;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// `ceil(estimate × 1.20)`.
pub fn buffered_gas_limit(estimate: u64) -> u64 {
    let buffered = (estimate as u128 * GAS_LIMIT_BUFFER_PERCENT as u128).div_ceil(100);
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

/// `ceil(price × 1.10)`, saturating at `u128::MAX`.
pub fn bumped_price(price: u128) -> u128 {
    price
        .checked_mul(REPLACEMENT_BUMP_PERCENT)
        .map_or(u128::MAX, |p| p.div_ceil(100))
}

/// Bump every fee field of `original`, honoring a caller floor.
pub fn replacement_fee(original: FeeQuote, floor: Option<u128>) -> FeeQuote {
    let floor = floor.unwrap_or(0);
    match original {
        FeeQuote::Legacy { gas_price } => FeeQuote::Legacy {
            gas_price: bumped_price(gas_price).max(floor),
        },
        FeeQuote::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let max_fee = bumped_price(max_fee_per_gas).max(floor);
            FeeQuote::Eip1559 {
                max_fee_per_gas: max_fee,
                max_priority_fee_per_gas: bumped_price(max_priority_fee_per_gas).min(max_fee),
            }
        }
    }
}

fn apply_fee(request: TransactionRequest, fee: FeeQuote) -> TransactionRequest {
    match fee {
        FeeQuote::Legacy { gas_price } => request.with_gas_price(gas_price),
        FeeQuote::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => request
            .with_max_fee_per_gas(max_fee_per_gas)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The parts of a transaction a replacement must repeat.
#[derive(Debug, Clone)]
struct ReplacementBase {
    to: Address,
    value: U256,
    input: Bytes,
    nonce: u64,
    gas_limit: u64,
    fee: FeeQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplacementKind {
    SpeedUp,
    Cancel,
}

impl ReplacementKind {
    fn label(&self) -> &'static str {
        match self {
            ReplacementKind::SpeedUp => "speedUp",
            ReplacementKind::Cancel => "cancel",
        }
    }
}

/// Owns every write path through the signer.
#[derive(Debug)]
pub struct TransactionManager {
    client: Arc<ChainClient>,
    signer: Arc<SignerContext>,
    contracts: Arc<ContractRegistry>,
    nonces: NonceAllocator,
    records: DashMap<TxHash, PendingTransaction>,
    config: TransactionConfig,
}

impl TransactionManager {
    pub fn new(
        client: Arc<ChainClient>,
        signer: Arc<SignerContext>,
        contracts: Arc<ContractRegistry>,
        config: TransactionConfig,
    ) -> Self {
        let nonces = NonceAllocator::new(client.clone(), signer.address());
        Self {
            client,
            signer,
            contracts,
            nonces,
            records: DashMap::new(),
            config,
        }
    }

    /// Snapshot of an in-flight record this manager broadcast.
    ///
    /// Records are dropped once a confirmation wait or a replacement
    /// attempt sees a transaction with their nonce mined.
    pub fn record(&self, hash: TxHash) -> Option<PendingTransaction> {
        self.records.get(&hash).map(|r| r.clone())
    }

    /// Records still awaiting a terminal state, oldest nonce first.
    pub fn pending(&self) -> Vec<PendingTransaction> {
        let mut pending: Vec<PendingTransaction> = self
            .records
            .iter()
            .filter(|r| r.state == TransactionState::Submitted)
            .map(|r| r.clone())
            .collect();
        pending.sort_by_key(|r| r.nonce);
        pending
    }

    /// Estimate, price, sign and broadcast a contract write.
    pub async fn submit(&self, request: CallRequest) -> BlockchainResult<TransactionResult> {
        let handle = self
            .contracts
            .resolve(&request.target, request.abi.as_deref())?;
        let input = handle.encode_call(&request.method, &request.args)?;
        let args = format_args(&request.args);
        let target = handle.address;

        let submit_error = |phase: SubmitPhase, reason: String| BlockchainError::Submit {
            phase,
            method: request.method.clone(),
            args: args.clone(),
            target,
            reason,
        };

        let tx = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(target)
            .with_value(request.value)
            .with_input(input.clone());

        let gas_limit = match request.gas.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = self
                    .client
                    .estimate_gas(&tx)
                    .await
                    .map_err(|e| submit_error(SubmitPhase::Estimating, e.to_string()))?;
                let limit = buffered_gas_limit(estimate);
                tracing::debug!(
                    contract = %handle.label(),
                    method = %request.method,
                    estimate,
                    gas_limit = limit,
                    "Gas estimated"
                );
                limit
            }
        };

        let fee = match request.gas.gas_price {
            Some(gas_price) => FeeQuote::Legacy { gas_price },
            None => {
                let fee = self
                    .client
                    .fee_quote()
                    .await
                    .map_err(|e| submit_error(SubmitPhase::Pricing, e.to_string()))?;
                self.check_price_ceiling(&fee)?;
                fee
            }
        };

        let nonce = self
            .nonces
            .allocate()
            .await
            .map_err(|e| submit_error(SubmitPhase::NonceAllocation, e.to_string()))?;

        let hash = match self.broadcast(tx, nonce, gas_limit, fee).await {
            Ok(hash) => hash,
            Err(e) => {
                self.nonces.release(nonce).await;
                metrics::record_transaction("submit_failed");
                return Err(submit_error(SubmitPhase::Broadcasting, e.to_string()));
            }
        };

        let record = PendingTransaction {
            hash,
            from: self.signer.address(),
            to: target,
            nonce,
            gas_limit,
            fee,
            value: request.value,
            input,
            method: request.method.clone(),
            submitted_at: unix_now(),
            state: TransactionState::Submitted,
            replaced_by: None,
        };
        let result = record.result();
        self.records.insert(hash, record);
        metrics::record_transaction("submitted");

        tracing::info!(
            tx_hash = %hash,
            contract = %handle.label(),
            method = %request.method,
            nonce,
            gas_limit,
            gas_price = fee.effective_gas_price(),
            "Transaction submitted"
        );

        Ok(result)
    }

    /// Submit requests one after another, stopping at the first failure.
    ///
    /// Transactions already broadcast are reported in the error and cannot
    /// be rolled back.
    pub async fn batch_submit(
        &self,
        requests: Vec<CallRequest>,
    ) -> BlockchainResult<Vec<TransactionResult>> {
        let pause = Duration::from_millis(self.config.batch_send_interval_ms);
        let mut results = Vec::with_capacity(requests.len());

        for (index, request) in requests.into_iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                sleep(pause).await;
            }

            match self.submit(request).await {
                Ok(result) => results.push(result),
                Err(source) => {
                    tracing::warn!(index, submitted = results.len(), error = %source, "Batch aborted");
                    return Err(BlockchainError::Batch {
                        index,
                        submitted: results.iter().map(|r| r.hash).collect(),
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(results)
    }

    /// Preview `estimate × gas price` without sending anything.
    pub async fn estimate_cost(&self, request: &CallRequest) -> BlockchainResult<CostEstimate> {
        let handle = self
            .contracts
            .resolve(&request.target, request.abi.as_deref())?;
        let input = handle.encode_call(&request.method, &request.args)?;

        let tx = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(handle.address)
            .with_value(request.value)
            .with_input(input);

        let gas_estimate =
            self.client
                .estimate_gas(&tx)
                .await
                .map_err(|e| BlockchainError::ContractCall {
                    method: request.method.clone(),
                    args: format_args(&request.args),
                    reason: e.to_string(),
                })?;
        let gas_price = self.client.gas_price().await?;

        Ok(CostEstimate::new(gas_estimate, gas_price))
    }

    /// Block until `confirmations` blocks include the transaction.
    ///
    /// A timeout leaves the record pending; the transaction may still be
    /// mined later. A reverted receipt marks it failed.
    pub async fn wait_for_confirmation(
        &self,
        hash: TxHash,
        confirmations: Option<u64>,
        timeout_ms: Option<u64>,
    ) -> BlockchainResult<TransactionReceiptView> {
        let required = confirmations
            .unwrap_or(self.config.default_confirmations)
            .max(1);
        let timeout_ms = timeout_ms.unwrap_or(self.config.confirmation_timeout_ms);
        let poll_interval = Duration::from_millis(self.config.receipt_poll_interval_ms.max(1));

        let result = timeout(Duration::from_millis(timeout_ms), async {
            let mut ticker = interval(poll_interval);

            loop {
                ticker.tick().await;

                let receipt = match self.client.receipt(hash).await {
                    Ok(Some(r)) => r,
                    Ok(None) => {
                        tracing::debug!(tx_hash = %hash, "Transaction pending");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(tx_hash = %hash, error = %e, "Receipt poll failed");
                        continue;
                    }
                };

                let view = TransactionReceiptView::from(&receipt);
                if !view.succeeded() {
                    self.settle(hash, TransactionState::Failed);
                    metrics::record_transaction("reverted");
                    tracing::warn!(tx_hash = %hash, block = view.block_number, "Transaction reverted");
                    return Err(BlockchainError::Reverted {
                        hash,
                        block_number: view.block_number,
                    });
                }

                let current = match self.client.block_number().await {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(tx_hash = %hash, error = %e, "Block number poll failed");
                        continue;
                    }
                };
                let seen = current.saturating_sub(view.block_number) + 1;

                if seen >= required {
                    self.settle(hash, TransactionState::Confirmed);
                    metrics::record_transaction("confirmed");
                    tracing::info!(
                        tx_hash = %hash,
                        block = view.block_number,
                        confirmations = seen,
                        "Transaction confirmed"
                    );
                    return Ok(view);
                }

                tracing::debug!(
                    tx_hash = %hash,
                    confirmations = seen,
                    required,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(tx_hash = %hash, timeout_ms, "Confirmation wait timed out");
                Err(BlockchainError::ConfirmationTimeout { hash, timeout_ms })
            }
        }
    }

    /// Current on-chain status. Read-only; records are not touched.
    pub async fn get_status(&self, hash: TxHash) -> BlockchainResult<TransactionStatus> {
        let Some(receipt) = self.client.receipt(hash).await? else {
            return Ok(TransactionStatus {
                hash,
                status: OnChainStatus::Pending,
                confirmations: 0,
                receipt: None,
            });
        };

        let view = TransactionReceiptView::from(&receipt);
        let current = self.client.block_number().await?;

        Ok(TransactionStatus {
            hash,
            status: if view.succeeded() {
                OnChainStatus::Confirmed
            } else {
                OnChainStatus::Failed
            },
            confirmations: current.saturating_sub(view.block_number) + 1,
            receipt: Some(view),
        })
    }

    /// Resend the same call at a higher price with the same nonce.
    pub async fn speed_up(
        &self,
        hash: TxHash,
        new_gas_price: Option<u128>,
    ) -> BlockchainResult<TransactionResult> {
        self.replace(hash, new_gas_price, ReplacementKind::SpeedUp)
            .await
    }

    /// Supersede a pending transaction with a zero-value self-transfer.
    pub async fn cancel(
        &self,
        hash: TxHash,
        new_gas_price: Option<u128>,
    ) -> BlockchainResult<TransactionResult> {
        self.replace(hash, new_gas_price, ReplacementKind::Cancel)
            .await
    }

    async fn replace(
        &self,
        hash: TxHash,
        new_gas_price: Option<u128>,
        kind: ReplacementKind,
    ) -> BlockchainResult<TransactionResult> {
        let (live, base) = self.replacement_base(hash).await?;

        // Any transaction in the chain being mined means the nonce is spent.
        for candidate in self.chain_hashes(hash, live) {
            if let Some(receipt) = self.client.receipt(candidate).await? {
                let state = if receipt.status() {
                    TransactionState::Confirmed
                } else {
                    TransactionState::Failed
                };
                self.settle(candidate, state);
                return Err(BlockchainError::AlreadyMined(candidate));
            }
        }

        let own = self.signer.address();
        let (to, value, input, gas_limit) = match kind {
            ReplacementKind::SpeedUp => (
                base.to,
                base.value,
                base.input.clone(),
                base.gas_limit,
            ),
            ReplacementKind::Cancel => (own, U256::ZERO, Bytes::new(), CANCEL_GAS_LIMIT),
        };
        let fee = replacement_fee(base.fee, new_gas_price);

        let tx = TransactionRequest::default()
            .with_from(own)
            .with_to(to)
            .with_value(value)
            .with_input(input.clone());

        let new_hash = self
            .broadcast(tx, base.nonce, gas_limit, fee)
            .await
            .map_err(|e| {
                metrics::record_transaction("submit_failed");
                BlockchainError::Submit {
                    phase: SubmitPhase::Broadcasting,
                    method: kind.label().to_string(),
                    args: format!("[\"{}\"]", hash),
                    target: to,
                    reason: e.to_string(),
                }
            })?;

        if let Some(mut record) = self.records.get_mut(&live) {
            record.state = TransactionState::Replaced;
            record.replaced_by = Some(new_hash);
        }

        let record = PendingTransaction {
            hash: new_hash,
            from: own,
            to,
            nonce: base.nonce,
            gas_limit,
            fee,
            value,
            input,
            method: kind.label().to_string(),
            submitted_at: unix_now(),
            state: TransactionState::Submitted,
            replaced_by: None,
        };
        let result = record.result();
        self.records.insert(new_hash, record);
        metrics::record_transaction("replaced");

        tracing::info!(
            original = %hash,
            replaced = %live,
            tx_hash = %new_hash,
            kind = kind.label(),
            nonce = base.nonce,
            gas_price = fee.effective_gas_price(),
            "Replacement transaction submitted"
        );

        Ok(result)
    }

    /// Hash and fields of the transaction a replacement must outbid.
    ///
    /// A local record that was already replaced resolves to the newest
    /// replacement in its chain. Unknown hashes are read from the node.
    async fn replacement_base(&self, hash: TxHash) -> BlockchainResult<(TxHash, ReplacementBase)> {
        if let Some(record) = self.live_record(hash) {
            let base = ReplacementBase {
                to: record.to,
                value: record.value,
                input: record.input.clone(),
                nonce: record.nonce,
                gas_limit: record.gas_limit,
                fee: record.fee,
            };
            return Ok((record.hash, base));
        }

        use alloy::consensus::Transaction as _;

        let tx = self
            .client
            .transaction(hash)
            .await?
            .ok_or(BlockchainError::TransactionNotFound(hash))?;

        if alloy::network::TransactionResponse::from(&tx) != self.signer.address() {
            return Err(BlockchainError::NotOwnTransaction(hash));
        }

        let fee = if tx.is_dynamic_fee() {
            FeeQuote::Eip1559 {
                max_fee_per_gas: tx.max_fee_per_gas(),
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas().unwrap_or_default(),
            }
        } else {
            FeeQuote::Legacy {
                gas_price: tx.gas_price().unwrap_or_default(),
            }
        };

        let base = ReplacementBase {
            to: tx.to().unwrap_or_default(),
            value: tx.value(),
            input: tx.input().clone(),
            nonce: tx.nonce(),
            gas_limit: tx.gas_limit(),
            fee,
        };
        Ok((hash, base))
    }

    /// Hashes from `hash` to `live`, newest first.
    fn chain_hashes(&self, hash: TxHash, live: TxHash) -> Vec<TxHash> {
        let mut chain = vec![hash];
        let mut current = hash;
        while current != live {
            match self.records.get(&current).and_then(|r| r.replaced_by) {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    async fn broadcast(
        &self,
        tx: TransactionRequest,
        nonce: u64,
        gas_limit: u64,
        fee: FeeQuote,
    ) -> BlockchainResult<TxHash> {
        let tx = apply_fee(tx.with_nonce(nonce).with_gas_limit(gas_limit), fee);
        self.signer.sign_and_send(&self.client, tx).await
    }

    fn check_price_ceiling(&self, fee: &FeeQuote) -> BlockchainResult<()> {
        let Some(max_gwei) = self.config.max_gas_price_gwei else {
            return Ok(());
        };
        let current_gwei = fee.effective_gas_price() / WEI_PER_GWEI;
        if current_gwei > max_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(current_gwei).unwrap_or(u64::MAX),
                max_gwei,
            });
        }
        Ok(())
    }

    /// Forget every record sharing the nonce of a mined transaction.
    ///
    /// Once one transaction with a nonce is mined the others can never be,
    /// so the whole replacement chain leaves the map.
    fn settle(&self, hash: TxHash, state: TransactionState) {
        let Some(nonce) = self.records.get(&hash).map(|r| r.nonce) else {
            return;
        };
        let before = self.records.len();
        self.records.retain(|_, record| record.nonce != nonce);
        tracing::debug!(
            tx_hash = %hash,
            state = %state,
            nonce,
            pruned = before - self.records.len(),
            "Transaction settled"
        );
    }

    /// Newest record in the replacement chain starting at `hash`.
    fn live_record(&self, hash: TxHash) -> Option<PendingTransaction> {
        let mut current = self.records.get(&hash)?.clone();
        while let Some(next) = current.replaced_by {
            match self.records.get(&next) {
                Some(record) => current = record.clone(),
                None => break,
            }
        }
        Some(current)
    }
}
