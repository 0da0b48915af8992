//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Node connection and signing key source.
    pub chain: ChainConnectionConfig,

    /// Transaction lifecycle tunables.
    pub transactions: TransactionConfig,

    /// Event listener tunables.
    pub events: EventConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static contract catalog.
    pub contracts: Vec<ContractEntry>,
}

/// Connection to the single JSON-RPC node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConnectionConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Environment variable holding the hex-encoded signing key.
    pub private_key_env: String,

    /// Expected chain ID; checked against the node at connect time when set.
    pub chain_id: Option<u64>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConnectionConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            private_key_env: "GATEWAY_PRIVATE_KEY".to_string(),
            chain_id: None,
            rpc_timeout_secs: 10,
        }
    }
}

impl ChainConnectionConfig {
    /// Read the signing key from the configured environment variable.
    pub fn private_key(&self) -> Option<String> {
        std::env::var(&self.private_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Transaction manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Confirmations awaited when the caller does not specify.
    pub default_confirmations: u64,

    /// Deadline for a confirmation wait in milliseconds.
    pub confirmation_timeout_ms: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Pause between batch entries in milliseconds (0 = none).
    pub batch_send_interval_ms: u64,

    /// Maximum gas price in gwei for fresh submissions (protection against spikes).
    pub max_gas_price_gwei: Option<u64>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_confirmations: 1,
            confirmation_timeout_ms: 300_000,
            receipt_poll_interval_ms: 2_000,
            batch_send_interval_ms: 0,
            max_gas_price_gwei: None,
        }
    }
}

/// Event subscription configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    /// Log polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Blocks to wait behind head before delivering logs.
    pub confirmation_blocks: u64,

    /// Largest block span requested in a single `eth_getLogs`.
    pub max_block_range: u64,

    /// Buffer size of the outbound event channel.
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4_000,
            confirmation_blocks: 0,
            max_block_range: 1_000,
            channel_capacity: 1_024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One entry of the static contract catalog.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ContractEntry {
    /// Unique short name.
    pub alias: String,

    /// Environment variable holding the deployed address.
    #[serde(default)]
    pub address_env: Option<String>,

    /// Literal address, used when `address_env` is unset or empty.
    #[serde(default)]
    pub address: Option<String>,

    /// Human-readable ABI signatures.
    #[serde(default)]
    pub abi: Vec<String>,

    /// Events installed by the core listener bootstrap.
    #[serde(default)]
    pub core_events: Vec<String>,
}

impl ContractEntry {
    /// Resolve the configured address, preferring the environment.
    pub fn configured_address(&self) -> Option<String> {
        self.address_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| self.address.clone())
            .map(|addr| addr.trim().to_string())
            .filter(|addr| !addr.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [chain]
            rpc_url = "http://127.0.0.1:8545"

            [[contracts]]
            alias = "Token"
            address = "0x0000000000000000000000000000000000000abc"
            abi = ["function balanceOf(address) view returns (uint256)"]
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.chain.rpc_timeout_secs, 10);
        assert_eq!(config.transactions.confirmation_timeout_ms, 300_000);
        assert_eq!(config.contracts.len(), 1);
        assert!(config.contracts[0].core_events.is_empty());
    }

    #[test]
    fn test_address_env_takes_precedence() {
        let entry = ContractEntry {
            alias: "Registry".into(),
            address_env: Some("EVM_GATEWAY_TEST_REGISTRY_ADDRESS".into()),
            address: Some("0x0000000000000000000000000000000000000001".into()),
            ..Default::default()
        };
        assert_eq!(
            entry.configured_address().as_deref(),
            Some("0x0000000000000000000000000000000000000001")
        );

        std::env::set_var(
            "EVM_GATEWAY_TEST_REGISTRY_ADDRESS",
            "0x0000000000000000000000000000000000000002",
        );
        assert_eq!(
            entry.configured_address().as_deref(),
            Some("0x0000000000000000000000000000000000000002")
        );
        std::env::remove_var("EVM_GATEWAY_TEST_REGISTRY_ADDRESS");
    }

    #[test]
    fn test_missing_address_is_none() {
        let entry = ContractEntry {
            alias: "Unset".into(),
            address_env: Some("EVM_GATEWAY_TEST_UNSET_ADDRESS".into()),
            ..Default::default()
        };
        assert!(entry.configured_address().is_none());
    }
}
