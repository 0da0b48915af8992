//! Transaction manager scenarios against a mocked node.

use std::time::{Duration, Instant};

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{address, U256};
use alloy::providers::mock::Asserter;
use serde_json::json;

use evm_gateway::blockchain::{BlockchainError, SubmitPhase};
use evm_gateway::config::TransactionConfig;
use evm_gateway::transactions::{CallRequest, OnChainStatus, TransactionState};

mod common;
use common::*;

fn transfer(amount: u64) -> CallRequest {
    CallRequest::new("Token", "transfer").with_args(vec![
        DynSolValue::Address(address!("0x0000000000000000000000000000000000000123")),
        DynSolValue::Uint(U256::from(amount), 256),
    ])
}

/// Queue estimate, gas price, pending nonce and the broadcast hash.
fn queue_fresh_submit(asserter: &Asserter, estimate: u64, nonce: u64, hash: u8) {
    asserter.push_success(&hex_quantity(estimate));
    asserter.push_success(&hex_quantity(1_000_000_000));
    asserter.push_success(&hex_quantity(nonce));
    asserter.push_success(&json!(tx_hash(hash)));
}

#[tokio::test]
async fn test_submit_buffers_gas_estimate() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 5, 0x11);

    let result = gateway.transactions.submit(transfer(5)).await.unwrap();

    assert_eq!(result.gas_limit, 120_000);
    assert_eq!(result.nonce, 5);
    assert_eq!(result.gas_price, 1_000_000_000);
    assert_eq!(result.from, TEST_SIGNER);
    assert_eq!(result.to, TOKEN);
    assert_eq!(result.hash, tx_hash(0x11));

    let record = gateway.transactions.record(result.hash).unwrap();
    assert_eq!(record.state, TransactionState::Submitted);
    assert_eq!(gateway.transactions.pending().len(), 1);
}

#[tokio::test]
async fn test_consecutive_submits_get_consecutive_nonces() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 50_000, 9, 0x01);
    // Nonce comes from the allocator the second time.
    asserter.push_success(&hex_quantity(50_000));
    asserter.push_success(&hex_quantity(1_000_000_000));
    asserter.push_success(&json!(tx_hash(0x02)));

    let first = gateway.transactions.submit(transfer(1)).await.unwrap();
    let second = gateway.transactions.submit(transfer(2)).await.unwrap();

    assert_eq!(first.nonce, 9);
    assert_eq!(second.nonce, 10);
}

#[tokio::test]
async fn test_explicit_gas_skips_estimate_and_quote() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    asserter.push_success(&hex_quantity(3));
    asserter.push_success(&json!(tx_hash(0x21)));

    let result = gateway
        .transactions
        .submit(transfer(1).with_gas_limit(50_000).with_gas_price(2_000_000_000))
        .await
        .unwrap();

    assert_eq!(result.gas_limit, 50_000);
    assert_eq!(result.gas_price, 2_000_000_000);
    assert_eq!(result.nonce, 3);
}

#[tokio::test]
async fn test_estimate_failure_is_submit_error() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    asserter.push_failure_msg("execution reverted: insufficient balance");

    let err = gateway.transactions.submit(transfer(1)).await.unwrap_err();

    match err {
        BlockchainError::Submit {
            phase,
            method,
            target,
            reason,
            ..
        } => {
            assert_eq!(phase, SubmitPhase::Estimating);
            assert_eq!(method, "transfer");
            assert_eq!(target, TOKEN);
            assert!(reason.contains("insufficient balance"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(gateway.transactions.pending().is_empty());
}

#[tokio::test]
async fn test_failed_broadcast_releases_nonce() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    asserter.push_success(&hex_quantity(60_000));
    asserter.push_success(&hex_quantity(1_000_000_000));
    asserter.push_success(&hex_quantity(4));
    asserter.push_failure_msg("replacement transaction underpriced");

    let err = gateway.transactions.submit(transfer(1)).await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::Submit {
            phase: SubmitPhase::Broadcasting,
            ..
        }
    ));
    assert!(!err.is_retryable());

    asserter.push_success(&hex_quantity(60_000));
    asserter.push_success(&hex_quantity(1_000_000_000));
    asserter.push_success(&json!(tx_hash(0x31)));
    let retry = gateway.transactions.submit(transfer(1)).await.unwrap();
    assert_eq!(retry.nonce, 4);
}

#[tokio::test]
async fn test_gas_price_ceiling() {
    let asserter = Asserter::new();
    let mut config = test_config();
    config.transactions = TransactionConfig {
        max_gas_price_gwei: Some(1),
        ..config.transactions
    };
    let gateway = gateway_with(&asserter, config).await;
    asserter.push_success(&hex_quantity(60_000));
    asserter.push_success(&hex_quantity(2_000_000_000));

    let err = gateway.transactions.submit(transfer(1)).await.unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::GasPriceTooHigh {
            current_gwei: 2,
            max_gwei: 1
        }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_speed_up_reuses_nonce_and_bumps_price() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 7, 0x41);
    let original = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x42)));
    let replacement = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap();

    assert_eq!(replacement.nonce, original.nonce);
    assert_eq!(replacement.to, original.to);
    assert_eq!(replacement.value, original.value);
    assert_eq!(replacement.gas_limit, original.gas_limit);
    assert_eq!(replacement.gas_price, 1_100_000_000);

    let record = gateway.transactions.record(original.hash).unwrap();
    assert_eq!(record.state, TransactionState::Replaced);
    assert_eq!(record.replaced_by, Some(replacement.hash));
    assert_eq!(gateway.transactions.pending().len(), 1);
}

#[tokio::test]
async fn test_repeated_speed_up_outbids_latest_replacement() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 7, 0x43);
    let original = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x44)));
    let first = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap();

    // Receipts for the first replacement and the original, then the send.
    asserter.push_success(&json!(null));
    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x45)));
    let second = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap();

    assert_eq!(first.gas_price, 1_100_000_000);
    assert_eq!(second.gas_price, 1_210_000_000);
    assert_eq!(second.nonce, 7);

    let first_record = gateway.transactions.record(first.hash).unwrap();
    assert_eq!(first_record.state, TransactionState::Replaced);
    assert_eq!(first_record.replaced_by, Some(second.hash));

    let pending = gateway.transactions.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].hash, second.hash);
}

#[tokio::test]
async fn test_replacing_after_replacement_mined_fails() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 3, 0x46);
    let original = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x47)));
    let first = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap();

    asserter.push_success(&receipt_json(first.hash, 100, true));
    let err = gateway
        .transactions
        .cancel(original.hash, None)
        .await
        .unwrap_err();

    assert!(matches!(err, BlockchainError::AlreadyMined(hash) if hash == first.hash));
    assert!(gateway.transactions.record(original.hash).is_none());
    assert!(gateway.transactions.record(first.hash).is_none());
}

#[tokio::test]
async fn test_confirmed_replacement_prunes_whole_chain() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 4, 0x48);
    let original = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x49)));
    let replacement = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap();

    asserter.push_success(&receipt_json(replacement.hash, 100, true));
    asserter.push_success(&hex_quantity(100));
    gateway
        .transactions
        .wait_for_confirmation(replacement.hash, Some(1), Some(5_000))
        .await
        .unwrap();

    assert!(gateway.transactions.record(original.hash).is_none());
    assert!(gateway.transactions.record(replacement.hash).is_none());
    assert!(gateway.transactions.pending().is_empty());
}

#[tokio::test]
async fn test_cancel_is_zero_value_self_transfer() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 7, 0x51);
    let original = gateway
        .transactions
        .submit(transfer(5).with_value(U256::from(1_000)))
        .await
        .unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&json!(tx_hash(0x52)));
    let cancel = gateway
        .transactions
        .cancel(original.hash, Some(5_000_000_000))
        .await
        .unwrap();

    assert_eq!(cancel.nonce, 7);
    assert_eq!(cancel.to, TEST_SIGNER);
    assert_eq!(cancel.value, U256::ZERO);
    assert_eq!(cancel.gas_limit, 21_000);
    assert_eq!(cancel.gas_price, 5_000_000_000);
}

#[tokio::test]
async fn test_replacing_mined_transaction_fails() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 1, 0x61);
    let original = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&receipt_json(original.hash, 100, true));
    let err = gateway
        .transactions
        .speed_up(original.hash, None)
        .await
        .unwrap_err();

    assert!(matches!(err, BlockchainError::AlreadyMined(hash) if hash == original.hash));
}

#[tokio::test]
async fn test_replacing_unknown_transaction_fails() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    asserter.push_success(&json!(null));

    let err = gateway
        .transactions
        .cancel(tx_hash(0x99), None)
        .await
        .unwrap_err();

    assert!(matches!(err, BlockchainError::TransactionNotFound(_)));
}

#[tokio::test]
async fn test_wait_for_confirmation() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 1, 0x71);
    let sent = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&json!(null));
    asserter.push_success(&receipt_json(sent.hash, 100, true));
    asserter.push_success(&hex_quantity(100));

    let receipt = gateway
        .transactions
        .wait_for_confirmation(sent.hash, Some(1), Some(5_000))
        .await
        .unwrap();

    assert_eq!(receipt.block_number, 100);
    assert_eq!(receipt.status, 1);
    // Mined transactions leave the in-flight map.
    assert!(gateway.transactions.record(sent.hash).is_none());
    assert!(gateway.transactions.pending().is_empty());
}

#[tokio::test]
async fn test_wait_for_reverted_receipt() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 1, 0x72);
    let sent = gateway.transactions.submit(transfer(5)).await.unwrap();

    asserter.push_success(&receipt_json(sent.hash, 100, false));

    let err = gateway
        .transactions
        .wait_for_confirmation(sent.hash, Some(1), Some(5_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BlockchainError::Reverted { block_number: 100, .. }
    ));
    assert!(!err.is_retryable());
    assert!(gateway.transactions.record(sent.hash).is_none());
}

#[tokio::test]
async fn test_wait_timeout_leaves_record_pending() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 1, 0x73);
    let sent = gateway.transactions.submit(transfer(5)).await.unwrap();

    for _ in 0..64 {
        asserter.push_success(&json!(null));
    }

    let started = Instant::now();
    let err = gateway
        .transactions
        .wait_for_confirmation(sent.hash, Some(1), Some(100))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err,
        BlockchainError::ConfirmationTimeout { timeout_ms: 100, .. }
    ));
    assert!(err.is_retryable());
    assert_eq!(
        gateway.transactions.record(sent.hash).unwrap().state,
        TransactionState::Submitted
    );
}

#[tokio::test]
async fn test_get_status_confirmations_are_non_decreasing() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    let hash = tx_hash(0x81);

    asserter.push_success(&json!(null));
    let pending = gateway.transactions.get_status(hash).await.unwrap();
    assert_eq!(pending.status, OnChainStatus::Pending);
    assert_eq!(pending.confirmations, 0);

    asserter.push_success(&receipt_json(hash, 100, true));
    asserter.push_success(&hex_quantity(102));
    let first = gateway.transactions.get_status(hash).await.unwrap();

    asserter.push_success(&receipt_json(hash, 100, true));
    asserter.push_success(&hex_quantity(103));
    let second = gateway.transactions.get_status(hash).await.unwrap();

    assert_eq!(first.status, OnChainStatus::Confirmed);
    assert_eq!(second.status, OnChainStatus::Confirmed);
    assert_eq!(first.confirmations, 3);
    assert!(second.confirmations >= first.confirmations);
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    queue_fresh_submit(&asserter, 100_000, 1, 0x91);
    asserter.push_failure_msg("execution reverted");

    let err = gateway
        .transactions
        .batch_submit(vec![transfer(1), transfer(2), transfer(3)])
        .await
        .unwrap_err();

    match err {
        BlockchainError::Batch {
            index,
            submitted,
            source,
        } => {
            assert_eq!(index, 1);
            assert_eq!(submitted, vec![tx_hash(0x91)]);
            assert!(matches!(*source, BlockchainError::Submit { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_estimate_cost_is_pure_preview() {
    let asserter = Asserter::new();
    let gateway = gateway(&asserter).await;
    asserter.push_success(&hex_quantity(21_000));
    asserter.push_success(&hex_quantity(1_000_000_000));

    let cost = gateway
        .transactions
        .estimate_cost(&transfer(1))
        .await
        .unwrap();

    assert_eq!(cost.gas_estimate, 21_000);
    assert_eq!(cost.total_wei, U256::from(21_000_000_000_000u64));
    assert!(gateway.transactions.pending().is_empty());
}
