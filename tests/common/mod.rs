//! Shared fixtures for integration tests.
//!
//! Every test drives a mocked JSON-RPC provider: responses are queued on an
//! `Asserter` and consumed in call order.

#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::{address, Address, LogData, TxHash, U256};
use alloy::providers::{mock::Asserter, ProviderBuilder};
use alloy::rpc::types::Log;
use serde_json::{json, Value};

use evm_gateway::config::{
    ChainConnectionConfig, ContractEntry, EventConfig, GatewayConfig, TransactionConfig,
};
use evm_gateway::contracts::parse_abi;
use evm_gateway::{ChainClient, Gateway};

/// Anvil's first account.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_SIGNER: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
pub const KEY_ENV: &str = "EVM_GATEWAY_IT_PRIVATE_KEY";

pub const TOKEN: Address = address!("0x0000000000000000000000000000000000000abc");

pub fn token_abi() -> Vec<String> {
    vec![
        "function balanceOf(address owner) view returns (uint256)".into(),
        "function transfer(address to, uint256 amount) returns (bool)".into(),
        "event Transfer(address indexed from, address indexed to, uint256 value)".into(),
    ]
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        chain: ChainConnectionConfig {
            private_key_env: KEY_ENV.into(),
            ..Default::default()
        },
        transactions: TransactionConfig {
            receipt_poll_interval_ms: 10,
            ..Default::default()
        },
        events: EventConfig {
            poll_interval_ms: 20,
            ..Default::default()
        },
        contracts: vec![ContractEntry {
            alias: "Token".into(),
            address: Some(TOKEN.to_string()),
            abi: token_abi(),
            core_events: vec!["Transfer".into()],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Client over `asserter`; queues the chain id consumed at construction.
pub async fn mock_client(asserter: &Asserter) -> Arc<ChainClient> {
    asserter.push_success(&json!("0x7a69"));
    let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
    Arc::new(
        ChainClient::from_provider(Arc::new(provider), &ChainConnectionConfig::default())
            .await
            .unwrap(),
    )
}

pub async fn gateway_with(asserter: &Asserter, config: GatewayConfig) -> Gateway {
    // Every test uses the same key, so concurrent writes are harmless.
    std::env::set_var(KEY_ENV, TEST_PRIVATE_KEY);
    let client = mock_client(asserter).await;
    Gateway::with_client(config, client).unwrap()
}

pub async fn gateway(asserter: &Asserter) -> Gateway {
    gateway_with(asserter, test_config()).await
}

pub fn hex_quantity(value: u64) -> Value {
    json!(format!("{:#x}", value))
}

pub fn tx_hash(byte: u8) -> TxHash {
    TxHash::repeat_byte(byte)
}

/// Legacy receipt mined in `block_number`.
pub fn receipt_json(hash: TxHash, block_number: u64, success: bool) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": "0x0",
        "blockHash": "0x1234567890123456789012345678901234567890123456789012345678901234",
        "blockNumber": format!("{:#x}", block_number),
        "from": TEST_SIGNER,
        "to": TOKEN,
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "cumulativeGasUsed": "0x5208",
        "contractAddress": null,
        "status": if success { "0x1" } else { "0x0" },
        "type": "0x0",
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "logs": []
    })
}

/// `Transfer(from, to, value)` emitted by the token.
pub fn transfer_log(from: Address, to: Address, value: u64, block_number: u64, hash: TxHash) -> Log {
    let abi = parse_abi(&token_abi()).unwrap();
    let selector = abi.event("Transfer").unwrap()[0].selector();

    Log {
        inner: alloy::primitives::Log {
            address: TOKEN,
            data: LogData::new_unchecked(
                vec![selector, from.into_word(), to.into_word()],
                U256::from(value).to_be_bytes::<32>().to_vec().into(),
            ),
        },
        block_hash: None,
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(hash),
        transaction_index: Some(0),
        log_index: Some(0),
        removed: false,
    }
}
