//! Registry of active event subscriptions.
//!
//! # Responsibilities
//! - Keep at most one listener task per `(address, event)` key
//! - Install the catalog's core events at startup
//! - Fan core events out to business modules over a broadcast channel
//! - Abort every listener on teardown

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::BlockchainResult;
use crate::config::schema::EventConfig;
use crate::contracts::registry::ContractRegistry;
use crate::events::listener::Listener;
use crate::events::types::{EventCallback, HandlerError, NormalizedEvent, SubscriptionKey};
use crate::observability::metrics;

struct Subscription {
    id: Uuid,
    task: JoinHandle<()>,
}

/// Owns every listener task. Dropping the registry tears them down.
pub struct EventSubscriptionRegistry {
    client: Arc<ChainClient>,
    contracts: Arc<ContractRegistry>,
    config: EventConfig,
    subscriptions: DashMap<SubscriptionKey, Subscription>,
    outbound: broadcast::Sender<NormalizedEvent>,
}

impl EventSubscriptionRegistry {
    pub fn new(
        client: Arc<ChainClient>,
        contracts: Arc<ContractRegistry>,
        config: EventConfig,
    ) -> Self {
        let (outbound, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            client,
            contracts,
            config,
            subscriptions: DashMap::new(),
            outbound,
        }
    }

    /// Start delivering `event_name` logs from the target to `callback`.
    ///
    /// An existing listener for the same key is aborted and replaced.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<S: AsRef<str>>(
        &self,
        address_or_alias: &str,
        abi: Option<&[S]>,
        event_name: &str,
        callback: EventCallback,
    ) -> BlockchainResult<Uuid> {
        let handle = self.contracts.resolve(address_or_alias, abi)?;
        let event = handle.event(event_name)?.clone();
        let key = SubscriptionKey::new(handle.address, event.name.clone());

        let listener = Listener::new(
            self.client.clone(),
            handle.address,
            event,
            callback,
            self.config.clone(),
        );
        let id = Uuid::new_v4();
        let subscription = Subscription {
            id,
            task: tokio::spawn(listener.run()),
        };

        match self.subscriptions.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                let previous = existing.insert(subscription);
                previous.task.abort();
                tracing::info!(key = %key, previous = %previous.id, "Listener replaced");
            }
            Entry::Vacant(slot) => {
                slot.insert(subscription);
                tracing::info!(key = %key, contract = %handle.label(), "Listener installed");
            }
        }

        metrics::set_active_subscriptions(self.subscriptions.len());
        Ok(id)
    }

    /// Stop the listener for one key. Unknown keys are a logged no-op.
    ///
    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, address_or_alias: &str, event_name: &str) -> bool {
        let Some(address) = self.resolve_address(address_or_alias) else {
            tracing::warn!(
                target_contract = address_or_alias,
                event = event_name,
                "Unsubscribe for unknown contract ignored"
            );
            return false;
        };
        let key = SubscriptionKey::new(address, event_name);

        match self.subscriptions.remove(&key) {
            Some((_, subscription)) => {
                subscription.task.abort();
                metrics::set_active_subscriptions(self.subscriptions.len());
                tracing::info!(key = %key, "Listener removed");
                true
            }
            None => {
                tracing::warn!(key = %key, "Unsubscribe for unknown subscription ignored");
                false
            }
        }
    }

    /// Install every binding's core events, publishing to [`Self::events`].
    ///
    /// Returns the number of listeners installed.
    pub fn bootstrap_core_listeners(&self) -> usize {
        let mut installed = 0;

        for binding in self.contracts.bindings() {
            for event_name in &binding.core_events {
                let outbound = self.outbound.clone();
                let publish: EventCallback =
                    Arc::new(move |event: NormalizedEvent| -> Result<(), HandlerError> {
                        // No receivers is fine; nobody is listening yet.
                        let _ = outbound.send(event);
                        Ok(())
                    });

                let address = binding.address.to_string();
                match self.subscribe::<&str>(&address, None, event_name, publish) {
                    Ok(_) => installed += 1,
                    Err(e) => tracing::warn!(
                        alias = %binding.alias,
                        event = %event_name,
                        error = %e,
                        "Core listener not installed"
                    ),
                }
            }
        }

        tracing::info!(listeners = installed, "Core listeners bootstrapped");
        installed
    }

    /// Receiver for events published by core listeners.
    pub fn events(&self) -> broadcast::Receiver<NormalizedEvent> {
        self.outbound.subscribe()
    }

    /// Abort every listener and clear the registry. Idempotent.
    pub fn teardown(&self) {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, subscription| {
            subscription.task.abort();
            false
        });
        metrics::set_active_subscriptions(0);
        if before > 0 {
            tracing::info!(listeners = before, "Event listeners torn down");
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Whether a listener for `key` exists and is still running.
    pub fn is_active(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions
            .get(key)
            .is_some_and(|s| !s.task.is_finished())
    }

    pub fn subscription_id(&self, key: &SubscriptionKey) -> Option<Uuid> {
        self.subscriptions.get(key).map(|s| s.id)
    }

    fn resolve_address(&self, address_or_alias: &str) -> Option<Address> {
        self.contracts
            .get_by_alias(address_or_alias)
            .map(|b| b.address)
            .ok()
            .or_else(|| address_or_alias.parse().ok())
    }
}

impl Drop for EventSubscriptionRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for EventSubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscriptionRegistry")
            .field("subscriptions", &self.subscriptions.len())
            .field("poll_interval_ms", &self.config.poll_interval_ms)
            .finish()
    }
}
