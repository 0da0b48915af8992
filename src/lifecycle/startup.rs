//! Startup orchestration.
//!
//! Builds every component in dependency order and hands them out by `Arc`.
//! Nothing here is a process-wide singleton; a second `Gateway` is fully
//! independent of the first.

use std::sync::Arc;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::SignerContext;
use crate::config::GatewayConfig;
use crate::contracts::registry::ContractRegistry;
use crate::events::registry::EventSubscriptionRegistry;
use crate::transactions::manager::TransactionManager;

/// The wired subsystem.
#[derive(Debug)]
pub struct Gateway {
    pub config: GatewayConfig,
    pub client: Arc<ChainClient>,
    pub signer: Arc<SignerContext>,
    pub contracts: Arc<ContractRegistry>,
    pub transactions: Arc<TransactionManager>,
    pub events: Arc<EventSubscriptionRegistry>,
}

impl Gateway {
    /// Connect to the node and build every component.
    ///
    /// # Errors
    /// `Configuration` for a missing RPC URL, key or malformed catalog entry;
    /// `Rpc` when the node is unreachable.
    pub async fn start(config: GatewayConfig) -> BlockchainResult<Self> {
        let client = Arc::new(ChainClient::connect(&config.chain).await?);
        Self::with_client(config, client)
    }

    /// Build on an already-connected client.
    pub fn with_client(config: GatewayConfig, client: Arc<ChainClient>) -> BlockchainResult<Self> {
        let private_key = config.chain.private_key().ok_or_else(|| {
            BlockchainError::Configuration(format!(
                "Environment variable {} not set",
                config.chain.private_key_env
            ))
        })?;
        let signer = Arc::new(SignerContext::init(&private_key, &client)?);

        let mut contracts = ContractRegistry::new(client.clone());
        let registered = contracts.register_static(&config.contracts)?;
        let contracts = Arc::new(contracts);

        let transactions = Arc::new(TransactionManager::new(
            client.clone(),
            signer.clone(),
            contracts.clone(),
            config.transactions.clone(),
        ));
        let events = Arc::new(EventSubscriptionRegistry::new(
            client.clone(),
            contracts.clone(),
            config.events.clone(),
        ));

        tracing::info!(
            chain_id = client.chain_id(),
            signer = %signer.address(),
            contracts = registered,
            "Gateway initialized"
        );

        Ok(Self {
            config,
            client,
            signer,
            contracts,
            transactions,
            events,
        })
    }

    /// Tear down every event listener.
    pub fn shutdown(&self) {
        self.events.teardown();
        tracing::info!(pending = self.transactions.pending().len(), "Gateway stopped");
    }
}
