//! Readiness detection for a single story
//!
//! A story may embed any number of screenshot wrappers and nothing tells us
//! how many up front. Each wrapper emits INIT while rendering and MOUNT once it
//! is in the DOM, and all INITs of a render pass fire before the first MOUNT.
//! So by the time a MOUNT arrives we know the wrapper count, and the story is
//! complete when the MOUNT count catches up with the INIT count.
//!
//! A story without wrappers emits nothing. That case is handled by a search
//! timer: if no INIT shows up within the timeout after selection, the story is
//! resolved as empty.
//!
//! Known limitations:
//!
//! - The count comparison uses the INIT count at the time of each MOUNT. A
//!   wrapper that initialises only after every earlier wrapper has mounted is
//!   missed and the story resolves short.
//! - There is no deadline once an INIT was seen. A wrapper that initialises
//!   but never mounts stalls detection for that story indefinitely.

use crate::constants::EventTypes;
use crate::types::{ComponentContext, StoryRef};
use crate::StorySelector;
use screenshot_channel::Channel;
use std::time::Duration;
use tracing::{debug, warn};

/// Select `story` and collect the contexts of its mounted wrappers.
///
/// Never fails. Subscriptions are released when the returned future
/// completes or is dropped.
pub async fn detect(
    story: &StoryRef,
    selector: &dyn StorySelector,
    channel: &dyn Channel,
    timeout: Duration,
) -> Vec<ComponentContext> {
    // One subscription for both events keeps their relative order intact
    let mut lifecycle = channel.subscribe(&[
        EventTypes::COMPONENT_INIT,
        EventTypes::COMPONENT_MOUNT,
    ]);

    let mut inited: Vec<ComponentContext> = Vec::new();
    let mut mounted: Vec<ComponentContext> = Vec::new();

    debug!(%story, "Selecting story");
    selector.select_story(&story.kind, &story.story);

    let search = tokio::time::sleep(timeout);
    tokio::pin!(search);
    let mut searching = true;

    loop {
        tokio::select! {
            biased;

            event = lifecycle.recv() => {
                let Some(event) = event else {
                    warn!(%story, mounted = mounted.len(), "Channel closed during detection");
                    return mounted;
                };

                let context = match event.decode::<ComponentContext>() {
                    Ok(context) if context.belongs_to(story) => context,
                    Ok(_) => continue,
                    Err(err) => {
                        debug!(%story, "Ignoring malformed lifecycle event: {}", err);
                        continue;
                    }
                };

                if event.name == EventTypes::COMPONENT_INIT {
                    inited.push(context);
                } else {
                    mounted.push(context);
                    if mounted.len() == inited.len() {
                        debug!(%story, wrappers = mounted.len(), "All known wrappers mounted");
                        return mounted;
                    }
                }
            }

            _ = &mut search, if searching => {
                searching = false;

                if inited.is_empty() {
                    debug!(%story, "No wrapper initialised before timeout");
                    return Vec::new();
                }

                warn!(
                    %story,
                    inited = inited.len(),
                    mounted = mounted.len(),
                    "Wrappers initialised but not all mounted, waiting without deadline"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenshot_channel::LocalChannel;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    /// Emits a fixed event script synchronously on selection
    struct ScriptedSelector {
        channel: Arc<LocalChannel>,
        scripts: HashMap<StoryRef, Vec<(&'static str, Value)>>,
        selected: Mutex<Vec<StoryRef>>,
    }

    impl ScriptedSelector {
        fn new(channel: Arc<LocalChannel>) -> Self {
            Self {
                channel,
                scripts: HashMap::new(),
                selected: Mutex::new(Vec::new()),
            }
        }

        fn script(mut self, story: &StoryRef, events: Vec<(&'static str, Value)>) -> Self {
            self.scripts.insert(story.clone(), events);
            self
        }
    }

    impl StorySelector for ScriptedSelector {
        fn select_story(&self, kind: &str, story: &str) {
            let story = StoryRef::new(kind, story);
            self.selected.lock().unwrap().push(story.clone());

            for (name, payload) in self.scripts.get(&story).cloned().unwrap_or_default() {
                self.channel.emit(name, payload).unwrap();
            }
        }
    }

    fn init(kind: &str, story: &str, id: u32) -> (&'static str, Value) {
        (
            EventTypes::COMPONENT_INIT,
            json!({ "kind": kind, "story": story, "id": id }),
        )
    }

    fn mount(kind: &str, story: &str, id: u32) -> (&'static str, Value) {
        (
            EventTypes::COMPONENT_MOUNT,
            json!({ "kind": kind, "story": story, "id": id }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wrappers_resolve_empty_at_timeout() {
        let channel = Arc::new(LocalChannel::default());
        let selector = ScriptedSelector::new(channel.clone());
        let story = StoryRef::new("Button", "plain");

        let start = Instant::now();
        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;
        let elapsed = start.elapsed();

        assert!(contexts.is_empty());
        assert!(elapsed >= TIMEOUT);
        assert!(elapsed < TIMEOUT + Duration::from_millis(10));
        assert_eq!(*selector.selected.lock().unwrap(), vec![story]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_wrappers_mounted_before_timeout() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone()).script(
            &story,
            vec![
                init("Button", "A", 1),
                init("Button", "A", 2),
                mount("Button", "A", 1),
                mount("Button", "A", 2),
            ],
        );

        let start = Instant::now();
        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;

        assert!(start.elapsed() < TIMEOUT);
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].extra["id"], json!(1));
        assert_eq!(contexts[1].extra["id"], json!(2));
        assert!(contexts.iter().all(|c| c.belongs_to(&story)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_for_other_stories_are_ignored() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone()).script(
            &story,
            vec![
                init("Button", "B", 9),
                init("Button", "A", 1),
                mount("Button", "B", 9),
                mount("Card", "A", 7),
                mount("Button", "A", 1),
            ],
        );

        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;

        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].extra["id"], json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_init_is_undercounted() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone()).script(
            &story,
            vec![
                init("Button", "A", 1),
                mount("Button", "A", 1),
                init("Button", "A", 2),
                mount("Button", "A", 2),
            ],
        );

        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;

        // Resolves on the first mount; the second wrapper is never seen
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].extra["id"], json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_burst_is_fully_counted() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Grid", "huge");

        let mut script: Vec<_> = (0..500).map(|id| init("Grid", "huge", id)).collect();
        script.extend((0..500).map(|id| mount("Grid", "huge", id)));
        let selector = ScriptedSelector::new(channel.clone()).script(&story, script);

        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;

        assert_eq!(contexts.len(), 500);
        assert_eq!(contexts[0].extra["id"], json!(0));
        assert_eq!(contexts[499].extra["id"], json!(499));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_released_after_detection() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone())
            .script(&story, vec![init("Button", "A", 1), mount("Button", "A", 1)]);

        detect(&story, &selector, channel.as_ref(), TIMEOUT).await;
        assert_eq!(channel.listener_count(EventTypes::COMPONENT_INIT), 0);
        assert_eq!(channel.listener_count(EventTypes::COMPONENT_MOUNT), 0);

        let empty = StoryRef::new("Button", "empty");
        detect(&empty, &selector, channel.as_ref(), TIMEOUT).await;
        assert_eq!(channel.listener_count(EventTypes::COMPONENT_INIT), 0);
        assert_eq!(channel.listener_count(EventTypes::COMPONENT_MOUNT), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_without_mount_outlives_timeout() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone())
            .script(&story, vec![init("Button", "A", 1)]);

        let pending = tokio::time::timeout(
            TIMEOUT * 5,
            detect(&story, &selector, channel.as_ref(), TIMEOUT),
        )
        .await;

        assert!(pending.is_err());
        assert_eq!(channel.listener_count(EventTypes::COMPONENT_MOUNT), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_after_timeout_still_completes() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "slow");
        let selector = ScriptedSelector::new(channel.clone())
            .script(&story, vec![init("Button", "slow", 1)]);

        let late_channel = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TIMEOUT * 2).await;
            late_channel
                .emit(
                    EventTypes::COMPONENT_MOUNT,
                    json!({ "kind": "Button", "story": "slow" }),
                )
                .unwrap();
        });

        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;
        assert_eq!(contexts.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_resolves_with_partial_mounts() {
        let channel = Arc::new(LocalChannel::default());
        let story = StoryRef::new("Button", "A");
        let selector = ScriptedSelector::new(channel.clone())
            .script(&story, vec![init("Button", "A", 1), init("Button", "A", 2)]);

        let closer = channel.clone();
        tokio::spawn(async move {
            closer
                .emit(
                    EventTypes::COMPONENT_MOUNT,
                    json!({ "kind": "Button", "story": "A", "id": 1 }),
                )
                .unwrap();
            closer.close();
        });

        let contexts = detect(&story, &selector, channel.as_ref(), TIMEOUT).await;
        assert_eq!(contexts.len(), 1);
    }
}
