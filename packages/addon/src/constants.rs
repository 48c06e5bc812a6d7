//! Wire constants shared with the capture driver and the wrapper components

use std::time::Duration;

pub const ADDON_NAME: &str = "storybook-chrome-screenshot";

/// How long a freshly selected story gets to emit its first INIT before it is
/// treated as having no screenshot wrappers.
pub const SEARCH_COMPONENT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Emitted once by the host with the full story catalog
pub const SET_STORIES: &str = "setStories";

/// Values of the `chrome-screenshot` query parameter
pub struct PhaseTypes;

impl PhaseTypes {
    pub const PREPARE: &'static str = "prepare";
    pub const CAPTURE: &'static str = "capture";
}

/// Lifecycle events emitted by screenshot wrapper components
pub struct EventTypes;

impl EventTypes {
    pub const COMPONENT_INIT: &'static str = "storybook-chrome-screenshot/component-init";
    pub const COMPONENT_MOUNT: &'static str = "storybook-chrome-screenshot/component-mount";
    pub const COMPONENT_READY: &'static str = "storybook-chrome-screenshot/component-ready";
    pub const COMPONENT_ERROR: &'static str = "storybook-chrome-screenshot/component-error";
}
