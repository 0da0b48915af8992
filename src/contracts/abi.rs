//! ABI resolution and encoding for bound contracts.
//!
//! Method and event names are checked against the loaded ABI before any call
//! is made, so a typo'd name is a `MethodNotFound`/`EventNotFound` error
//! rather than a failed RPC.

use std::sync::Arc;

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::{Event, Function, JsonAbi};
use alloy::primitives::{Address, Bytes};

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Parse human-readable signatures into an ABI.
pub fn parse_abi<S: AsRef<str>>(signatures: &[S]) -> BlockchainResult<JsonAbi> {
    JsonAbi::parse(signatures.iter().map(|s| s.as_ref()))
        .map_err(|e| BlockchainError::Abi(format!("Invalid ABI signature: {}", e)))
}

/// A contract address paired with the ABI used to talk to it.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    pub address: Address,
    pub abi: Arc<JsonAbi>,
    /// Catalog alias when resolved through the registry.
    pub alias: Option<String>,
}

impl ContractHandle {
    pub fn new(address: Address, abi: Arc<JsonAbi>) -> Self {
        Self {
            address,
            abi,
            alias: None,
        }
    }

    /// Alias if known, address otherwise.
    pub fn label(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }

    /// Resolve a method by name and argument count.
    ///
    /// Overloads are disambiguated by arity; a unique name with the wrong
    /// arity is an ABI error.
    pub fn function(&self, method: &str, arity: Option<usize>) -> BlockchainResult<&Function> {
        let overloads = self
            .abi
            .function(method)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| BlockchainError::MethodNotFound {
                contract: self.label(),
                method: method.to_string(),
            })?;

        let Some(arity) = arity else {
            return Ok(&overloads[0]);
        };

        overloads
            .iter()
            .find(|f| f.inputs.len() == arity)
            .ok_or_else(|| {
                BlockchainError::Abi(format!(
                    "{} expects {} argument(s), got {}",
                    overloads[0].signature(),
                    overloads[0].inputs.len(),
                    arity
                ))
            })
    }

    /// Resolve an event by name.
    pub fn event(&self, name: &str) -> BlockchainResult<&Event> {
        self.abi
            .event(name)
            .and_then(|events| events.first())
            .ok_or_else(|| BlockchainError::EventNotFound {
                contract: self.label(),
                event: name.to_string(),
            })
    }

    /// Encode calldata (selector included) for `method(args)`.
    pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> BlockchainResult<Bytes> {
        let function = self.function(method, Some(args.len()))?;
        let data = function.abi_encode_input(args).map_err(|e| {
            BlockchainError::Abi(format!("Failed to encode {}: {}", function.signature(), e))
        })?;
        Ok(data.into())
    }

    /// Decode the return data of `method`.
    pub fn decode_output(
        &self,
        method: &str,
        arity: usize,
        data: &[u8],
    ) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(method, Some(arity))?;
        function.abi_decode_output(data).map_err(|e| {
            BlockchainError::Abi(format!(
                "Failed to decode output of {}: {}",
                function.signature(),
                e
            ))
        })
    }

    /// Parse string arguments using the method's declared input types.
    pub fn coerce_args(&self, method: &str, raw: &[String]) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(method, Some(raw.len()))?;
        function
            .inputs
            .iter()
            .zip(raw)
            .map(|(param, value)| {
                let ty: DynSolType = param.resolve().map_err(|e| {
                    BlockchainError::Abi(format!("Unsupported type {}: {}", param.ty, e))
                })?;
                ty.coerce_str(value).map_err(|e| {
                    BlockchainError::Abi(format!(
                        "Cannot parse '{}' as {} for {}: {}",
                        value, param.ty, method, e
                    ))
                })
            })
            .collect()
    }
}

/// Render a decoded ABI value as JSON.
///
/// Integers become decimal strings so no precision is lost.
pub fn sol_value_to_json(value: &DynSolValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(alloy::hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Address(addr) => Value::String(addr.to_checksum(None)),
        DynSolValue::Function(f) => Value::String(alloy::hex::encode_prefixed(f.as_slice())),
        DynSolValue::Bytes(bytes) => Value::String(alloy::hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(sol_value_to_json).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{:?}", other)),
    }
}

/// Compact rendering of call arguments for error context and logs.
pub fn format_args(args: &[DynSolValue]) -> String {
    let rendered: Vec<serde_json::Value> = args.iter().map(sol_value_to_json).collect();
    serde_json::Value::Array(rendered).to_string()
}
