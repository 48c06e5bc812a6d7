//! # Screenshot Channel
//!
//! Publish/subscribe bus connecting the screenshot addon to its host tool.
//!
//! The channel is an unscoped broadcast medium: every event carries a name and
//! a JSON payload, and any number of subscribers may listen for any set of
//! names. Each subscriber gets its own unbounded queue, so no event is lost
//! to a slow reader. Subscriptions are handles. Dropping one unsubscribes it, so a
//! listener never outlives the code that registered it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screenshot_channel::{Channel, LocalChannel};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let channel = LocalChannel::new();
//! let mut sub = channel.subscribe(&["setStories"]);
//!
//! channel.emit("setStories", json!({ "stories": [] })).unwrap();
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event.name, "setStories");
//! # }
//! ```

mod local;
mod subscription;

pub use local::LocalChannel;
pub use subscription::{ListenerRegistry, Subscription};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Failed to decode '{event}' payload: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// A single named event travelling over the channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub name: String,
    pub payload: Value,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> ChannelResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|source| ChannelError::Decode {
            event: self.name.clone(),
            source,
        })
    }
}

/// Event bus contract shared by the addon and its host.
pub trait Channel: Send + Sync {
    /// Listen for every event whose name is in `events`, in emission order.
    fn subscribe(&self, events: &[&str]) -> Subscription;

    /// Broadcast an event. Returns how many subscriptions listen for it.
    ///
    /// Emitting an event nobody listens for is not an error.
    fn emit(&self, event: &str, payload: Value) -> ChannelResult<usize>;

    /// Registry of the channel's live subscriptions
    fn listeners(&self) -> &ListenerRegistry;

    /// Number of live subscriptions listening for `event`
    fn listener_count(&self, event: &str) -> usize {
        self.listeners().count(event)
    }
}
