//! Catalog walk: run readiness detection over every story, one at a time

use crate::constants::{EventTypes, SET_STORIES};
use crate::detector::detect;
use crate::types::{ComponentContext, SetStoriesPayload, StoryCatalog};
use crate::{AddonError, Result, StorySelector};
use screenshot_channel::{Channel, Subscription};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

/// Collects wrapper contexts across the whole story catalog.
///
/// The walker starts listening for the host's catalog as soon as it is
/// created, so build it before the host gets a chance to publish.
pub struct CatalogWalker<'a> {
    channel: &'a dyn Channel,
    stories: Subscription,
    timeout: Duration,
}

impl<'a> CatalogWalker<'a> {
    pub fn new(channel: &'a dyn Channel, timeout: Duration) -> Self {
        Self {
            channel,
            stories: channel.subscribe(&[SET_STORIES]),
            timeout,
        }
    }

    /// Wait for the catalog, then detect every story in catalog order.
    ///
    /// Stories are visited strictly one after another: selecting a story is a
    /// global side effect on the host, and lifecycle events carry no run
    /// identifier, so overlapping detections would steal each other's events.
    ///
    /// Any `COMPONENT_ERROR` seen after the catalog arrived aborts the walk
    /// and discards everything collected so far.
    pub async fn collect(self, selector: &dyn StorySelector) -> Result<Vec<ComponentContext>> {
        let CatalogWalker {
            channel,
            mut stories,
            timeout,
        } = self;

        let catalog = receive_catalog(&mut stories).await?;
        drop(stories);

        let mut errors = channel.subscribe(&[EventTypes::COMPONENT_ERROR]);
        let mut contexts = Vec::new();

        info!(stories = catalog.len(), "Searching catalog for screenshot wrappers");

        for story in catalog.walk() {
            let span = info_span!("story", kind = %story.kind, story = %story.story);

            tokio::select! {
                biased;

                event = errors.recv() => {
                    return Err(match event {
                        Some(event) => AddonError::ComponentError(event.decode()?),
                        None => AddonError::ChannelClosed,
                    });
                }

                found = detect(&story, selector, channel, timeout).instrument(span) => {
                    debug!(%story, wrappers = found.len(), "Story searched");
                    contexts.extend(found);
                }
            }
        }

        info!(contexts = contexts.len(), "Catalog search complete");
        Ok(contexts)
    }
}

async fn receive_catalog(stories: &mut Subscription) -> Result<StoryCatalog> {
    let event = stories.recv().await.ok_or(AddonError::ChannelClosed)?;
    let payload: SetStoriesPayload =
        serde_json::from_value(event.payload).map_err(AddonError::InvalidCatalog)?;
    Ok(payload.stories)
}

/// Convenience for [`CatalogWalker::new`] followed by [`CatalogWalker::collect`]
pub async fn collect(
    channel: &dyn Channel,
    selector: &dyn StorySelector,
    timeout: Duration,
) -> Result<Vec<ComponentContext>> {
    CatalogWalker::new(channel, timeout).collect(selector).await
}
