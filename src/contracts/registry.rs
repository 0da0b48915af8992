//! Registry of known contract bindings.
//!
//! # Responsibilities
//! - Build one binding per catalog alias that has a configured address
//! - Resolve alias-or-address targets to a [`ContractHandle`]
//! - Execute ad hoc read calls and decode their results
//!
//! The registry is built once at startup and shared by handle; bindings are
//! never added afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::schema::ContractEntry;
use crate::contracts::abi::{format_args, parse_abi, ContractHandle};
use crate::transactions::{CallRequest, TransactionManager, TransactionResult};

/// A catalog contract bound to its deployed address.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    pub alias: String,
    pub address: Address,
    pub abi: Arc<JsonAbi>,
    /// Events installed by the core listener bootstrap.
    pub core_events: Vec<String>,
}

impl ContractBinding {
    /// Bound handle for calls and subscriptions.
    pub fn handle(&self) -> ContractHandle {
        ContractHandle {
            address: self.address,
            abi: self.abi.clone(),
            alias: Some(self.alias.clone()),
        }
    }
}

/// Alias → binding map plus read-call plumbing.
#[derive(Debug)]
pub struct ContractRegistry {
    client: Arc<ChainClient>,
    bindings: HashMap<String, ContractBinding>,
}

impl ContractRegistry {
    /// Create an empty registry.
    pub fn new(client: Arc<ChainClient>) -> Self {
        Self {
            client,
            bindings: HashMap::new(),
        }
    }

    /// Register every catalog entry that has a configured address.
    ///
    /// Entries without an address are skipped. A malformed address or ABI
    /// is a configuration error.
    ///
    /// Returns the number of bindings registered.
    pub fn register_static(&mut self, catalog: &[ContractEntry]) -> BlockchainResult<usize> {
        let mut registered = 0;

        for entry in catalog {
            let Some(raw_address) = entry.configured_address() else {
                tracing::info!(
                    alias = %entry.alias,
                    address_env = ?entry.address_env,
                    "No address configured, skipping contract"
                );
                continue;
            };

            if self.bindings.contains_key(&entry.alias) {
                return Err(BlockchainError::Configuration(format!(
                    "duplicate contract alias '{}'",
                    entry.alias
                )));
            }

            let address: Address = raw_address.parse().map_err(|e| {
                BlockchainError::Configuration(format!(
                    "Invalid address '{}' for contract {}: {}",
                    raw_address, entry.alias, e
                ))
            })?;
            let abi = parse_abi(&entry.abi).map_err(|e| {
                BlockchainError::Configuration(format!("contract {}: {}", entry.alias, e))
            })?;

            tracing::info!(alias = %entry.alias, address = %address, "Contract registered");

            self.bindings.insert(
                entry.alias.clone(),
                ContractBinding {
                    alias: entry.alias.clone(),
                    address,
                    abi: Arc::new(abi),
                    core_events: entry.core_events.clone(),
                },
            );
            registered += 1;
        }

        Ok(registered)
    }

    /// Look up a binding by alias.
    pub fn get_by_alias(&self, alias: &str) -> BlockchainResult<&ContractBinding> {
        self.bindings
            .get(alias)
            .ok_or_else(|| BlockchainError::ContractNotFound(alias.to_string()))
    }

    /// All registered bindings.
    pub fn bindings(&self) -> impl Iterator<Item = &ContractBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve an alias or raw address into a handle.
    ///
    /// An explicit `abi` overrides the catalog ABI. A raw address with no
    /// ABI borrows the ABI of a binding deployed at that address.
    pub fn resolve<S: AsRef<str>>(
        &self,
        address_or_alias: &str,
        abi: Option<&[S]>,
    ) -> BlockchainResult<ContractHandle> {
        let explicit = abi.map(parse_abi).transpose()?.map(Arc::new);

        if let Some(binding) = self.bindings.get(address_or_alias) {
            let mut handle = binding.handle();
            if let Some(abi) = explicit {
                handle.abi = abi;
            }
            return Ok(handle);
        }

        let address: Address = address_or_alias
            .parse()
            .map_err(|_| BlockchainError::ContractNotFound(address_or_alias.to_string()))?;

        let known = self.bindings.values().find(|b| b.address == address);
        match (explicit, known) {
            (Some(abi), known) => Ok(ContractHandle {
                address,
                abi,
                alias: known.map(|b| b.alias.clone()),
            }),
            (None, Some(binding)) => Ok(binding.handle()),
            (None, None) => Err(BlockchainError::Abi(format!(
                "no ABI supplied for unregistered address {}",
                address
            ))),
        }
    }

    /// Call a view/pure method and decode its return values.
    ///
    /// Any revert or node rejection surfaces as `ContractCall`.
    pub async fn call_read<S: AsRef<str>>(
        &self,
        address_or_alias: &str,
        abi: Option<&[S]>,
        method: &str,
        args: &[DynSolValue],
    ) -> BlockchainResult<Vec<DynSolValue>> {
        let handle = self.resolve(address_or_alias, abi)?;
        let calldata = handle.encode_call(method, args)?;

        let request = TransactionRequest::default()
            .with_to(handle.address)
            .with_input(calldata);

        let output = self
            .client
            .call(&request)
            .await
            .map_err(|e| BlockchainError::ContractCall {
                method: method.to_string(),
                args: format_args(args),
                reason: match e {
                    BlockchainError::Rpc(reason) => reason,
                    other => other.to_string(),
                },
            })?;

        tracing::debug!(
            contract = %handle.label(),
            method,
            bytes = output.len(),
            "Read call completed"
        );

        handle.decode_output(method, args.len(), &output)
    }

    /// Parse string arguments against a method's input types.
    pub fn coerce_args<S: AsRef<str>>(
        &self,
        address_or_alias: &str,
        abi: Option<&[S]>,
        method: &str,
        raw: &[String],
    ) -> BlockchainResult<Vec<DynSolValue>> {
        self.resolve(address_or_alias, abi)?
            .coerce_args(method, raw)
    }

    /// Write path: hand the call to the transaction manager.
    pub async fn call_write(
        &self,
        transactions: &TransactionManager,
        request: CallRequest,
    ) -> BlockchainResult<TransactionResult> {
        transactions.submit(request).await
    }
}
