//! Event subscription types and log normalization.

use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::Event;
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::Log;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::contracts::abi::sol_value_to_json;

/// Error type a handler may return. It is logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber callback invoked once per delivered event.
pub type EventCallback = Arc<dyn Fn(NormalizedEvent) -> Result<(), HandlerError> + Send + Sync>;

/// One active listener per `(address, event)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub address: Address,
    pub event: String,
}

impl SubscriptionKey {
    pub fn new(address: Address, event: impl Into<String>) -> Self {
        Self {
            address,
            event: event.into(),
        }
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.address, self.event)
    }
}

/// A named, decoded event parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventArg {
    pub name: String,
    pub value: DynSolValue,
}

/// A decoded log in a consumer-friendly shape.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub contract_address: Address,
    pub block_number: u64,
    pub transaction_hash: TxHash,
    pub log_index: Option<u64>,
    pub event_name: String,
    /// Parameters in declaration order, indexed and non-indexed merged.
    pub args: Vec<EventArg>,
    pub raw: Log,
}

impl NormalizedEvent {
    /// Values only, in declaration order.
    pub fn values(&self) -> Vec<DynSolValue> {
        self.args.iter().map(|a| a.value.clone()).collect()
    }

    /// Look up a parameter by name.
    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let args: Vec<serde_json::Value> = self
            .args
            .iter()
            .map(|a| serde_json::json!({ "name": a.name, "value": sol_value_to_json(&a.value) }))
            .collect();

        serde_json::json!({
            "contract_address": self.contract_address,
            "block_number": self.block_number,
            "transaction_hash": self.transaction_hash,
            "log_index": self.log_index,
            "event_name": self.event_name,
            "args": args,
        })
    }
}

/// Decode `log` against `event` and merge topics and data in parameter order.
pub fn normalize_log(event: &Event, log: &Log) -> BlockchainResult<NormalizedEvent> {
    let decoded = event.decode_log(&log.inner.data).map_err(|e| {
        BlockchainError::Abi(format!("Failed to decode {} log: {}", event.name, e))
    })?;

    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();

    let args = event
        .inputs
        .iter()
        .enumerate()
        .map(|(position, param)| {
            let value = if param.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let value = value.ok_or_else(|| {
                BlockchainError::Abi(format!(
                    "{} log is missing parameter {}",
                    event.name, position
                ))
            })?;
            let name = if param.name.is_empty() {
                format!("arg{}", position)
            } else {
                param.name.clone()
            };
            Ok(EventArg { name, value })
        })
        .collect::<BlockchainResult<Vec<_>>>()?;

    Ok(NormalizedEvent {
        contract_address: log.address(),
        block_number: log.block_number.unwrap_or_default(),
        transaction_hash: log.transaction_hash.unwrap_or_default(),
        log_index: log.log_index,
        event_name: event.name.clone(),
        args,
        raw: log.clone(),
    })
}
