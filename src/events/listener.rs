//! Log polling task behind each subscription.
//!
//! The first poll pins the cursor at the current confirmed head; later polls
//! fetch `(cursor, head - confirmation_blocks]` in bounded chunks, so only
//! events emitted after subscribing are delivered.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use alloy::json_abi::Event;
use alloy::primitives::Address;
use alloy::rpc::types::Filter;
use tokio::time::{interval, MissedTickBehavior};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::BlockchainResult;
use crate::config::schema::EventConfig;
use crate::events::types::{normalize_log, EventCallback, NormalizedEvent, SubscriptionKey};
use crate::observability::metrics;

/// Split `[start, end]` into inclusive chunks of at most `max_range` blocks.
pub fn block_ranges(start: u64, end: u64, max_range: u64) -> Vec<(u64, u64)> {
    if start > end {
        return Vec::new();
    }
    let step = max_range.max(1);
    let mut ranges = Vec::new();
    let mut from = start;
    loop {
        let to = from.saturating_add(step - 1).min(end);
        ranges.push((from, to));
        if to == end {
            break;
        }
        from = to + 1;
    }
    ranges
}

pub(crate) struct Listener {
    client: Arc<ChainClient>,
    key: SubscriptionKey,
    address: Address,
    event: Event,
    callback: EventCallback,
    config: EventConfig,
    /// Last block fully delivered.
    cursor: Option<u64>,
}

impl Listener {
    pub fn new(
        client: Arc<ChainClient>,
        address: Address,
        event: Event,
        callback: EventCallback,
        config: EventConfig,
    ) -> Self {
        Self {
            key: SubscriptionKey::new(address, event.name.clone()),
            client,
            address,
            event,
            callback,
            config,
            cursor: None,
        }
    }

    /// Poll until the task is aborted.
    pub async fn run(mut self) {
        tracing::info!(key = %self.key, "Event listener started");

        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll().await {
                tracing::warn!(key = %self.key, error = %e, "Event poll failed");
            }
        }
    }

    async fn poll(&mut self) -> BlockchainResult<()> {
        let head = self.client.block_number().await?;
        let target = head.saturating_sub(self.config.confirmation_blocks);

        let Some(last) = self.cursor else {
            tracing::debug!(key = %self.key, block = target, "Listener cursor initialized");
            self.cursor = Some(target);
            return Ok(());
        };

        if target <= last {
            return Ok(());
        }

        for (from, to) in block_ranges(last + 1, target, self.config.max_block_range) {
            let filter = Filter::new()
                .address(self.address)
                .event_signature(self.event.selector())
                .from_block(from)
                .to_block(to);

            let logs = self.client.logs(&filter).await?;
            for log in logs {
                if log.removed {
                    tracing::debug!(key = %self.key, tx_hash = ?log.transaction_hash, "Skipping removed log");
                    continue;
                }
                match normalize_log(&self.event, &log) {
                    Ok(event) => self.deliver(event),
                    Err(e) => {
                        tracing::warn!(key = %self.key, error = %e, "Undecodable log skipped");
                    }
                }
            }

            self.cursor = Some(to);
        }

        Ok(())
    }

    fn deliver(&self, event: NormalizedEvent) {
        let tx_hash = event.transaction_hash;
        let block = event.block_number;
        let callback = &self.callback;

        match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(Ok(())) => metrics::record_event_delivered(&self.key.event),
            Ok(Err(e)) => {
                metrics::record_handler_failure();
                tracing::error!(key = %self.key, tx_hash = %tx_hash, block, error = %e, "Event handler failed");
            }
            Err(_) => {
                metrics::record_handler_failure();
                tracing::error!(key = %self.key, tx_hash = %tx_hash, block, "Event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ranges_chunks() {
        assert_eq!(block_ranges(1, 10, 4), vec![(1, 4), (5, 8), (9, 10)]);
        assert_eq!(block_ranges(5, 5, 1000), vec![(5, 5)]);
        assert_eq!(block_ranges(1, 2000, 1000), vec![(1, 1000), (1001, 2000)]);
    }

    #[test]
    fn test_block_ranges_empty_and_degenerate() {
        assert!(block_ranges(10, 9, 100).is_empty());
        assert_eq!(block_ranges(1, 3, 0), vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(
            block_ranges(u64::MAX - 1, u64::MAX, 10),
            vec![(u64::MAX - 1, u64::MAX)]
        );
    }
}
