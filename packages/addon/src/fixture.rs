//! Scripted host for driving the addon without a real UI.
//!
//! A fixture describes which wrappers each story renders. Selecting a story
//! replays the lifecycle a real host would produce: INIT for every wrapper,
//! then MOUNT for every wrapper, then READY for every wrapper. A failing story
//! emits its INITs followed by a single COMPONENT_ERROR.

use crate::constants::{EventTypes, SET_STORIES};
use crate::types::{ComponentContext, SetStoriesPayload, StoryCatalog, StoryGroup, StoryRef};
use crate::{Result, StorySelector};
use screenshot_channel::Channel;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Fixture file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureCatalog {
    pub kinds: Vec<FixtureKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureKind {
    pub kind: String,
    pub stories: Vec<FixtureStory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureStory {
    pub name: String,

    /// Extra payload fields of each embedded wrapper
    #[serde(default)]
    pub wrappers: Vec<Map<String, Value>>,

    /// Emit COMPONENT_ERROR instead of mounting
    #[serde(default)]
    pub fails: bool,
}

impl FixtureStory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wrappers: Vec::new(),
            fails: false,
        }
    }

    /// Story with `count` wrappers, each tagged with its index
    pub fn with_wrappers(mut self, count: usize) -> Self {
        self.wrappers = (0..count)
            .map(|index| {
                let mut fields = Map::new();
                fields.insert("index".to_string(), json!(index));
                fields
            })
            .collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }
}

impl FixtureCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn kind(mut self, kind: impl Into<String>, stories: Vec<FixtureStory>) -> Self {
        self.kinds.push(FixtureKind {
            kind: kind.into(),
            stories,
        });
        self
    }

    /// Catalog as the host publishes it
    pub fn story_catalog(&self) -> StoryCatalog {
        StoryCatalog::new(
            self.kinds
                .iter()
                .map(|k| StoryGroup {
                    kind: k.kind.clone(),
                    stories: k.stories.iter().map(|s| s.name.clone()).collect(),
                })
                .collect(),
        )
    }

    fn find(&self, kind: &str, story: &str) -> Option<&FixtureStory> {
        self.kinds
            .iter()
            .filter(|k| k.kind == kind)
            .flat_map(|k| k.stories.iter())
            .find(|s| s.name == story)
    }
}

/// In-process host backed by a [`FixtureCatalog`]
pub struct FixtureHost {
    channel: Arc<dyn Channel>,
    catalog: FixtureCatalog,
    selections: Mutex<Vec<StoryRef>>,
}

impl FixtureHost {
    pub fn new(channel: Arc<dyn Channel>, catalog: FixtureCatalog) -> Self {
        Self {
            channel,
            catalog,
            selections: Mutex::new(Vec::new()),
        }
    }

    /// Emit `setStories` with the fixture's catalog
    pub fn publish_catalog(&self) -> Result<usize> {
        let payload = SetStoriesPayload {
            stories: self.catalog.story_catalog(),
        };
        Ok(self
            .channel
            .emit(SET_STORIES, serde_json::to_value(payload)?)?)
    }

    /// Wait until someone listens for `setStories`, then publish.
    ///
    /// A real host publishes its catalog once the addon has connected; this
    /// mirrors that for callers that start the addon on another task.
    pub async fn publish_catalog_when_ready(&self) -> Result<usize> {
        self.channel.listeners().wait_for_listener(SET_STORIES).await;
        self.publish_catalog()
    }

    /// Stories selected so far, in selection order
    pub fn selections(&self) -> Vec<StoryRef> {
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Emit READY for every wrapper of a story without selecting it
    pub fn emit_ready(&self, kind: &str, story: &str) -> Result<()> {
        for payload in self.wrapper_payloads(kind, story) {
            self.channel.emit(EventTypes::COMPONENT_READY, payload)?;
        }
        Ok(())
    }

    fn wrapper_payloads(&self, kind: &str, story: &str) -> Vec<Value> {
        let Some(fixture) = self.catalog.find(kind, story) else {
            return Vec::new();
        };

        fixture
            .wrappers
            .iter()
            .filter_map(|fields| {
                let context = ComponentContext {
                    kind: kind.to_string(),
                    story: story.to_string(),
                    extra: fields.clone(),
                };
                serde_json::to_value(context).ok()
            })
            .collect()
    }

    fn lifecycle(&self, kind: &str, story: &str) -> Vec<(&'static str, Value)> {
        let payloads = self.wrapper_payloads(kind, story);
        let fails = self
            .catalog
            .find(kind, story)
            .map(|s| s.fails)
            .unwrap_or(false);

        let mut events: Vec<(&'static str, Value)> = payloads
            .iter()
            .map(|p| (EventTypes::COMPONENT_INIT, p.clone()))
            .collect();

        if fails {
            events.push((
                EventTypes::COMPONENT_ERROR,
                json!({ "kind": kind, "story": story, "message": "Wrapper failed to render" }),
            ));
            return events;
        }

        events.extend(payloads.iter().map(|p| (EventTypes::COMPONENT_MOUNT, p.clone())));
        events.extend(payloads.into_iter().map(|p| (EventTypes::COMPONENT_READY, p)));
        events
    }
}

impl StorySelector for FixtureHost {
    fn select_story(&self, kind: &str, story: &str) {
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoryRef::new(kind, story));

        if self.catalog.find(kind, story).is_none() {
            warn!(kind, story, "Selected story is not in the fixture");
            return;
        }

        let events = self.lifecycle(kind, story);
        debug!(kind, story, events = events.len(), "Rendering fixture story");

        let channel = self.channel.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    for (name, payload) in events {
                        if channel.emit(name, payload).is_err() {
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                });
            }
            Err(_) => {
                for (name, payload) in events {
                    if channel.emit(name, payload).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_file_format() {
        let json = r#"{
            "kinds": [
                {
                    "kind": "Button",
                    "stories": [
                        { "name": "A", "wrappers": [{ "namespace": "x" }, {}] },
                        { "name": "B" },
                        { "name": "broken", "wrappers": [{}], "fails": true }
                    ]
                }
            ]
        }"#;

        let fixture: FixtureCatalog = serde_json::from_str(json).unwrap();
        let story = fixture.find("Button", "A").unwrap();
        assert_eq!(story.wrappers.len(), 2);
        assert!(fixture.find("Button", "broken").unwrap().fails);
        assert!(fixture.find("Card", "A").is_none());

        assert_eq!(
            fixture.story_catalog().flatten(),
            vec![
                StoryRef::new("Button", "A"),
                StoryRef::new("Button", "B"),
                StoryRef::new("Button", "broken"),
            ]
        );
    }

    #[test]
    fn test_lifecycle_order() {
        let fixture = FixtureCatalog::default().kind(
            "Button",
            vec![
                FixtureStory::new("A").with_wrappers(2),
                FixtureStory::new("broken").with_wrappers(1).failing(),
            ],
        );
        let host = FixtureHost::new(Arc::new(screenshot_channel::LocalChannel::default()), fixture);

        let names: Vec<_> = host.lifecycle("Button", "A").into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                EventTypes::COMPONENT_INIT,
                EventTypes::COMPONENT_INIT,
                EventTypes::COMPONENT_MOUNT,
                EventTypes::COMPONENT_MOUNT,
                EventTypes::COMPONENT_READY,
                EventTypes::COMPONENT_READY,
            ]
        );

        let names: Vec<_> = host
            .lifecycle("Button", "broken")
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(
            names,
            vec![EventTypes::COMPONENT_INIT, EventTypes::COMPONENT_ERROR]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_catalog_waits_for_listener() {
        let channel = Arc::new(screenshot_channel::LocalChannel::default());
        let fixture = FixtureCatalog::default().kind("Button", vec![FixtureStory::new("A")]);
        let host = Arc::new(FixtureHost::new(channel.clone(), fixture));

        let publish = tokio::spawn({
            let host = host.clone();
            async move { host.publish_catalog_when_ready().await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!publish.is_finished());

        let mut stories = channel.subscribe(&[SET_STORIES]);
        assert_eq!(publish.await.unwrap().unwrap(), 1);

        let payload: SetStoriesPayload = stories.recv().await.unwrap().decode().unwrap();
        assert_eq!(payload.stories.flatten(), vec![StoryRef::new("Button", "A")]);
    }
}
