//! Per-signer nonce allocation.
//!
//! Nonces are seeded lazily from the node's pending count and handed out
//! monotonically under an async mutex, so concurrent submits from one signer
//! never collide.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::Mutex;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::BlockchainResult;

/// Monotonic nonce source for a single sender.
#[derive(Debug)]
pub struct NonceAllocator {
    client: Arc<ChainClient>,
    address: Address,
    /// Next nonce to hand out. `None` means resync from chain first.
    next: Mutex<Option<u64>>,
}

impl NonceAllocator {
    pub fn new(client: Arc<ChainClient>, address: Address) -> Self {
        Self {
            client,
            address,
            next: Mutex::new(None),
        }
    }

    /// Reserve the next nonce.
    pub async fn allocate(&self) -> BlockchainResult<u64> {
        let mut next = self.next.lock().await;

        let nonce = match *next {
            Some(n) => n,
            None => {
                let n = self.client.nonce(self.address).await?;
                tracing::debug!(address = %self.address, nonce = n, "Nonce synced from chain");
                n
            }
        };

        *next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Give back a nonce whose transaction never reached the node.
    ///
    /// The last nonce handed out is rolled back in place. Anything older
    /// leaves a gap, so the allocator resyncs on the next call.
    pub async fn release(&self, nonce: u64) {
        let mut next = self.next.lock().await;

        if *next == Some(nonce + 1) {
            *next = Some(nonce);
        } else {
            tracing::warn!(
                address = %self.address,
                nonce,
                "Released nonce is not the latest, resyncing from chain"
            );
            *next = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConnectionConfig;
    use alloy::providers::{mock::Asserter, ProviderBuilder};
    use serde_json::json;

    async fn allocator(asserter: Asserter) -> NonceAllocator {
        asserter.push_success(&json!("0x7a69"));
        let provider = ProviderBuilder::new().connect_mocked_client(asserter);
        let client = ChainClient::from_provider(Arc::new(provider), &ChainConnectionConfig::default())
            .await
            .unwrap();
        NonceAllocator::new(Arc::new(client), Address::ZERO)
    }

    #[tokio::test]
    async fn test_allocations_are_monotonic() {
        let asserter = Asserter::new();
        let nonces = allocator(asserter.clone()).await;
        asserter.push_success(&json!("0x7"));

        assert_eq!(nonces.allocate().await.unwrap(), 7);
        assert_eq!(nonces.allocate().await.unwrap(), 8);
        assert_eq!(nonces.allocate().await.unwrap(), 9);
        assert_eq!(*nonces.next.lock().await, Some(10));
    }

    #[tokio::test]
    async fn test_release_latest_rolls_back() {
        let asserter = Asserter::new();
        let nonces = allocator(asserter.clone()).await;
        asserter.push_success(&json!("0x3"));

        let first = nonces.allocate().await.unwrap();
        nonces.release(first).await;
        assert_eq!(nonces.allocate().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_release_older_forces_resync() {
        let asserter = Asserter::new();
        let nonces = allocator(asserter.clone()).await;
        asserter.push_success(&json!("0x3"));

        let first = nonces.allocate().await.unwrap();
        let _second = nonces.allocate().await.unwrap();
        nonces.release(first).await;
        assert_eq!(*nonces.next.lock().await, None);

        asserter.push_success(&json!("0x4"));
        assert_eq!(nonces.allocate().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique() {
        let asserter = Asserter::new();
        let nonces = Arc::new(allocator(asserter.clone()).await);
        asserter.push_success(&json!("0x0"));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let nonces = nonces.clone();
                tokio::spawn(async move { nonces.allocate().await.unwrap() })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<u64>>());
    }
}
