//! # Chrome Screenshot Addon
//!
//! Readiness detection for component-story screenshot capture.
//!
//! The addon runs inside a host UI tool. It never renders anything itself:
//! it selects stories through the host, listens on the shared event channel
//! for the lifecycle events emitted by screenshot wrapper components, and
//! reports to an external capture driver through a [`ScreenshotSink`].
//!
//! ## Phases
//!
//! - `prepare` walks the whole catalog and reports every mounted wrapper
//!   context, so the driver knows which stories to shoot.
//! - `capture` waits for one target story's wrappers to report ready.
//!
//! Without a `chrome-screenshot` query parameter the addon stays inert.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screenshot_addon::{LaunchParams, ManifestSink, PhaseController, StorySelector};
//! use screenshot_channel::LocalChannel;
//! use std::sync::Arc;
//!
//! struct Host;
//!
//! impl StorySelector for Host {
//!     fn select_story(&self, kind: &str, story: &str) {
//!         println!("navigate to {kind}/{story}");
//!     }
//! }
//!
//! # async fn demo() -> screenshot_addon::Result<()> {
//! let channel = Arc::new(LocalChannel::default());
//! let sink = Arc::new(ManifestSink::new("./screenshots")?);
//! let controller = PhaseController::new(channel, Arc::new(Host), sink);
//!
//! let params = LaunchParams::from_location("http://localhost:6006/?chrome-screenshot=prepare");
//! controller.run(&params).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod detector;
mod fixture;
mod phase;
mod query;
mod sink;
mod types;
mod walker;

pub use config::{AddonConfig, DEFAULT_CONFIG_NAME};
pub use constants::{EventTypes, PhaseTypes, ADDON_NAME, SEARCH_COMPONENT_TIMEOUT, SET_STORIES};
pub use detector::detect;
pub use fixture::{FixtureCatalog, FixtureHost, FixtureKind, FixtureStory};
pub use phase::{CaptureListener, PhaseController, PhaseOutcome};
pub use query::{LaunchParams, Phase};
pub use sink::{ContextManifest, ManifestSink, ScreenshotSink, SinkStatus, MANIFEST_FILE_NAME};
pub use types::{ComponentContext, SetStoriesPayload, StoryCatalog, StoryGroup, StoryRef};
pub use walker::{collect, CatalogWalker};

use screenshot_channel::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddonError {
    #[error("An unknown phase called \"{0}\" is being executed.")]
    UnknownPhase(String),

    #[error("Capture phase requires both selectKind and selectStory")]
    MissingCaptureTarget,

    #[error("Component {}/{} reported an error", .0.kind, .0.story)]
    ComponentError(ComponentContext),

    #[error("Invalid story catalog: {0}")]
    InvalidCatalog(#[source] serde_json::Error),

    #[error("Channel closed before the screenshot phase finished")]
    ChannelClosed,

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AddonError>;

/// Host capability that navigates the UI to a story.
///
/// Selecting a story is a global side effect on the host: it unmounts the
/// current story and mounts the requested one, whose wrappers then emit their
/// lifecycle events on the channel.
pub trait StorySelector: Send + Sync {
    fn select_story(&self, kind: &str, story: &str);
}
