//! Core types for story readiness detection

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryRef {
    /// Component kind the story is grouped under (e.g., "Button")
    pub kind: String,

    /// Story name within the kind (e.g., "primary")
    pub story: String,
}

impl StoryRef {
    pub fn new(kind: impl Into<String>, story: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            story: story.into(),
        }
    }
}

impl fmt::Display for StoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.story)
    }
}

/// Payload emitted by a screenshot wrapper on init, mount and ready.
///
/// Only `kind` and `story` are interpreted. Everything else the wrapper sends
/// (viewport, namespace, delay, ...) is kept verbatim in `extra` and handed on
/// to the capture driver untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentContext {
    pub kind: String,
    pub story: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentContext {
    pub fn new(kind: impl Into<String>, story: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            story: story.into(),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn story_ref(&self) -> StoryRef {
        StoryRef::new(&self.kind, &self.story)
    }

    pub fn belongs_to(&self, story: &StoryRef) -> bool {
        self.kind == story.kind && self.story == story.story
    }
}

/// All stories of one kind, in host order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryGroup {
    pub kind: String,
    pub stories: Vec<String>,
}

/// Read-only snapshot of the host's story catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryCatalog {
    groups: Vec<StoryGroup>,
}

impl StoryCatalog {
    pub fn new(groups: Vec<StoryGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[StoryGroup] {
        &self.groups
    }

    /// Total number of stories across all kinds
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.stories.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk every story in catalog order: groups first, then stories within
    /// each group.
    pub fn walk(&self) -> impl Iterator<Item = StoryRef> + '_ {
        self.groups.iter().flat_map(|group| {
            group
                .stories
                .iter()
                .map(move |story| StoryRef::new(&group.kind, story))
        })
    }

    pub fn flatten(&self) -> Vec<StoryRef> {
        self.walk().collect()
    }
}

/// Body of the host's `setStories` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStoriesPayload {
    pub stories: StoryCatalog,
}
