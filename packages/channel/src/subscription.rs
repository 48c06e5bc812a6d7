//! Scoped subscription handles

use crate::ChannelEvent;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};

#[derive(Debug)]
struct Listener {
    id: u64,
    events: Vec<String>,
    sender: mpsc::UnboundedSender<ChannelEvent>,
}

impl Listener {
    fn matches(&self, name: &str) -> bool {
        self.events.iter().any(|e| e == name)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    listeners: Vec<Listener>,
    closed: bool,
}

/// Live listeners of a channel.
///
/// Every listener owns an unbounded queue, so an emitter that runs ahead of
/// its subscribers never loses events.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    state: Arc<Mutex<RegistryState>>,
    subscribed: Arc<Notify>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `events`.
    ///
    /// On a closed registry the subscription is handed out already ended.
    pub fn subscribe(&self, events: &[&str]) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let events: Vec<String> = events.iter().map(|e| e.to_string()).collect();

        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            if !state.closed {
                state.listeners.push(Listener { id, events, sender });
            }
            id
        };
        self.subscribed.notify_waiters();

        Subscription {
            id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Queue `event` for every matching listener. Returns how many got it.
    ///
    /// The lock is held for the whole fan-out, so concurrent emitters are
    /// seen in the same order by every listener.
    pub fn deliver(&self, event: &ChannelEvent) -> usize {
        let state = self.lock();
        let mut delivered = 0;
        for listener in state.listeners.iter().filter(|l| l.matches(&event.name)) {
            if listener.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn count(&self, event: &str) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|l| l.matches(event))
            .count()
    }

    /// Wait until at least one listener for `event` exists
    pub async fn wait_for_listener(&self, event: &str) {
        loop {
            let notified = self.subscribed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.count(event) > 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drop every listener queue. Listeners drain what is queued, then end.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn remove(&self, id: u64) {
        self.lock().listeners.retain(|l| l.id != id);
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Listener for a fixed set of event names.
///
/// Dropping the subscription removes the listener from the channel.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<ChannelEvent>,
    registry: ListenerRegistry,
}

impl Subscription {
    /// Wait for the next matching event.
    ///
    /// Returns `None` once the channel is closed and the queue is drained.
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_registry_counts_and_releases() {
        let registry = ListenerRegistry::new();

        let a = registry.subscribe(&["init", "mount"]);
        let b = registry.subscribe(&["init"]);

        assert_eq!(registry.count("init"), 2);
        assert_eq!(registry.count("mount"), 1);

        drop(a);
        assert_eq!(registry.count("init"), 1);
        assert_eq!(registry.count("mount"), 0);

        drop(b);
        assert_eq!(registry.count("init"), 0);
    }

    #[test]
    fn test_deliver_only_to_matching_listeners() {
        let registry = ListenerRegistry::new();
        let _init = registry.subscribe(&["init"]);
        let _both = registry.subscribe(&["init", "mount"]);

        assert_eq!(registry.deliver(&ChannelEvent::new("init", json!(1))), 2);
        assert_eq!(registry.deliver(&ChannelEvent::new("mount", json!(2))), 1);
        assert_eq!(registry.deliver(&ChannelEvent::new("ready", json!(3))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_listener_wakes_on_subscribe() {
        let registry = ListenerRegistry::new();

        let waiter = tokio::spawn({
            let registry = registry.clone();
            async move { registry.wait_for_listener("setStories").await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        let _other = registry.subscribe(&["init"]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        let _stories = registry.subscribe(&["setStories"]);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_existing_listener_returns_immediately() {
        let registry = ListenerRegistry::new();
        let _stories = registry.subscribe(&["setStories"]);
        registry.wait_for_listener("setStories").await;
    }
}
