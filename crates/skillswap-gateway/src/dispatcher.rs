use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use skillswap_types::events::GatewayEvent;

/// Fans live events out to connected clients.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every broadcast; room-scoped events are
    /// filtered per connection against its subscriptions.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> [(conn_id, sender)].
    /// A user with several tabs open has one entry per connection.
    user_channels: RwLock<HashMap<Uuid, Vec<(Uuid, mpsc::UnboundedSender<GatewayEvent>)>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    /// Earlier connections of the same user keep their own channels.
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister one connection's targeted channel.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.retain(|(stored, _)| *stored != conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to every connection of a user. Dropped if they
    /// are offline.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some(conns) = channels.get(&user_id) {
            for (_, tx) in conns {
                let _ = tx.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let event = GatewayEvent::CreditsUpdate {
            user_id: Uuid::new_v4(),
            balance: 15,
        };
        dispatcher.broadcast(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn targeted_send_only_reaches_that_user() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut alice_rx) = dispatcher.register_user_channel(alice).await;
        let (_, mut bob_rx) = dispatcher.register_user_channel(bob).await;

        let event = GatewayEvent::CreditsUpdate { user_id: alice, balance: 5 };
        dispatcher.send_to_user(alice, event.clone()).await;

        assert_eq!(alice_rx.recv().await, Some(event));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_tab_does_not_evict_the_first() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (old_conn, mut old_rx) = dispatcher.register_user_channel(user).await;
        let (_new_conn, mut new_rx) = dispatcher.register_user_channel(user).await;

        let event = GatewayEvent::CreditsUpdate { user_id: user, balance: 5 };
        dispatcher.send_to_user(user, event.clone()).await;
        assert_eq!(old_rx.recv().await, Some(event.clone()));
        assert_eq!(new_rx.recv().await, Some(event.clone()));

        dispatcher.unregister_user_channel(user, old_conn).await;
        assert_eq!(old_rx.recv().await, None);

        dispatcher.send_to_user(user, event.clone()).await;
        assert_eq!(new_rx.recv().await, Some(event));
    }
}
