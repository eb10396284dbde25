//! Broadcast hub
//!
//! Pub/sub fan-out of engine events to two addressable audiences: one
//! channel per user, and a shared channel for the operator pool. A listener
//! identifies itself once by subscribing to one of the two; publishing is a
//! pure fan-out over the subscription table, independent of any transport.
//!
//! Delivery is best-effort. A lagged or disconnected listener misses events;
//! ordering is FIFO within one channel, with no cross-channel guarantee.

use dashmap::DashMap;
use tokio::sync::broadcast;

use chattime_core::{AppEvent, HubConfig, UserId};

// ----------------------------------------------------------------------------
// Broadcast Hub
// ----------------------------------------------------------------------------

/// Subscription table for per-user channels and the operator channel
#[derive(Debug)]
pub struct BroadcastHub {
    config: HubConfig,
    users: DashMap<UserId, broadcast::Sender<AppEvent>>,
    operator: broadcast::Sender<AppEvent>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        let (operator, _) = broadcast::channel(config.operator_channel_capacity);
        Self {
            config,
            users: DashMap::new(),
            operator,
        }
    }

    /// Subscribe to the events addressed to one user
    pub fn subscribe_user(&self, user_id: UserId) -> broadcast::Receiver<AppEvent> {
        self.users
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.config.user_channel_capacity).0)
            .subscribe()
    }

    /// Subscribe to the shared operator channel
    pub fn subscribe_operator(&self) -> broadcast::Receiver<AppEvent> {
        self.operator.subscribe()
    }

    /// Publish to one user's channel
    pub fn publish_user(&self, user_id: UserId, event: AppEvent) {
        if let Some(sender) = self.users.get(&user_id) {
            // send only fails when no receiver is subscribed
            let _ = sender.send(event);
        }
        self.prune(user_id);
    }

    /// Publish to the operator channel
    pub fn publish_operator(&self, event: AppEvent) {
        let _ = self.operator.send(event);
    }

    /// Publish to one user's channel and the operator channel
    pub fn publish_both(&self, user_id: UserId, event: AppEvent) {
        self.publish_user(user_id, event.clone());
        self.publish_operator(event);
    }

    /// Drop a user channel nobody listens to anymore
    fn prune(&self, user_id: UserId) {
        self.users
            .remove_if(&user_id, |_, sender| sender.receiver_count() == 0);
    }

    #[cfg(test)]
    fn user_channel_count(&self) -> usize {
        self.users.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chattime_core::Amount;

    fn balance_event(user_id: UserId, balance: Amount) -> AppEvent {
        AppEvent::BalanceUpdated { user_id, balance }
    }

    #[tokio::test]
    async fn test_user_channels_are_isolated() {
        let hub = BroadcastHub::new(HubConfig::default());
        let alice = UserId::new();
        let bob = UserId::new();

        let mut alice_rx = hub.subscribe_user(alice);
        let mut bob_rx = hub.subscribe_user(bob);

        hub.publish_user(alice, balance_event(alice, 10));

        assert_eq!(alice_rx.recv().await.unwrap(), balance_event(alice, 10));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_both_reaches_operator() {
        let hub = BroadcastHub::new(HubConfig::default());
        let user = UserId::new();

        let mut user_rx = hub.subscribe_user(user);
        let mut operator_rx = hub.subscribe_operator();

        hub.publish_both(user, balance_event(user, 42));

        assert_eq!(user_rx.recv().await.unwrap(), balance_event(user, 42));
        assert_eq!(operator_rx.recv().await.unwrap(), balance_event(user, 42));
    }

    #[tokio::test]
    async fn test_publish_without_listeners_is_a_no_op() {
        let hub = BroadcastHub::new(HubConfig::default());
        let user = UserId::new();

        // Nobody subscribed; must not panic or retain state
        hub.publish_both(user, balance_event(user, 1));
        assert_eq!(hub.user_channel_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_user_channel_is_pruned() {
        let hub = BroadcastHub::new(HubConfig::default());
        let user = UserId::new();

        let rx = hub.subscribe_user(user);
        assert_eq!(hub.user_channel_count(), 1);
        drop(rx);

        hub.publish_user(user, balance_event(user, 5));
        assert_eq!(hub.user_channel_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_order_matches_publish_order() {
        let hub = BroadcastHub::new(HubConfig::default());
        let user = UserId::new();
        let mut rx = hub.subscribe_user(user);

        for balance in 0..5 {
            hub.publish_user(user, balance_event(user, balance));
        }
        for balance in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), balance_event(user, balance));
        }
    }
}
