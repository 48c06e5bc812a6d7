//! In-memory channel delivering straight into subscriber queues

use crate::{Channel, ChannelError, ChannelEvent, ChannelResult, ListenerRegistry, Subscription};
use serde_json::Value;

/// Channel living in the same process as the host.
///
/// Emitting fans the event out to every matching subscription under one lock,
/// so a subscription listening for several names observes them in the exact
/// order they were emitted, however far it lags behind.
#[derive(Debug, Default)]
pub struct LocalChannel {
    registry: ListenerRegistry,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shut the channel down. Pending subscriptions drain and then see `None`.
    pub fn close(&self) {
        if !self.registry.is_closed() {
            self.registry.close();
            tracing::debug!("Channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }
}

impl Channel for LocalChannel {
    fn subscribe(&self, events: &[&str]) -> Subscription {
        self.registry.subscribe(events)
    }

    fn emit(&self, event: &str, payload: Value) -> ChannelResult<usize> {
        if self.registry.is_closed() {
            return Err(ChannelError::Closed);
        }

        tracing::debug!(event, "Emitting channel event");
        Ok(self.registry.deliver(&ChannelEvent::new(event, payload)))
    }

    fn listeners(&self) -> &ListenerRegistry {
        &self.registry
    }
}
