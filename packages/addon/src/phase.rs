//! Top-level phase dispatch
//!
//! The phase is chosen once from the launch parameters and never changes for
//! the lifetime of the process. Every failure inside a phase ends up at the
//! sink's failure signal; nothing is returned to the host as an error.

use crate::constants::{EventTypes, SEARCH_COMPONENT_TIMEOUT};
use crate::query::{LaunchParams, Phase};
use crate::sink::ScreenshotSink;
use crate::types::{ComponentContext, StoryRef};
use crate::walker::CatalogWalker;
use crate::{Result, StorySelector};
use screenshot_channel::Channel;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// What a call to [`PhaseController::run`] ended with
#[derive(Debug)]
pub enum PhaseOutcome {
    /// No phase requested, nothing done
    Inert,

    /// Prepare finished and the sink accepted the contexts
    Prepared { contexts: usize },

    /// Capture is waiting for the target story to report ready
    Capturing(CaptureListener),

    /// The failure sink was signalled
    Failed,
}

/// Standing READY listener of a capture run.
///
/// The listener keeps running when this handle is dropped; call
/// [`CaptureListener::stop`] to remove it.
#[derive(Debug)]
pub struct CaptureListener {
    target: StoryRef,
    handle: JoinHandle<()>,
}

impl CaptureListener {
    pub fn target(&self) -> &StoryRef {
        &self.target
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

pub struct PhaseController {
    channel: Arc<dyn Channel>,
    selector: Arc<dyn StorySelector>,
    sink: Arc<dyn ScreenshotSink>,
    search_timeout: Duration,
}

impl PhaseController {
    pub fn new(
        channel: Arc<dyn Channel>,
        selector: Arc<dyn StorySelector>,
        sink: Arc<dyn ScreenshotSink>,
    ) -> Self {
        Self {
            channel,
            selector,
            sink,
            search_timeout: SEARCH_COMPONENT_TIMEOUT,
        }
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Run the phase named in `params`.
    ///
    /// Without a phase parameter this returns [`PhaseOutcome::Inert`]
    /// immediately. Must be called from within a tokio runtime.
    pub async fn run(&self, params: &LaunchParams) -> PhaseOutcome {
        let Some(phase) = params.phase.as_deref() else {
            debug!("No screenshot phase requested, addon inert");
            return PhaseOutcome::Inert;
        };

        match self.dispatch(phase, params).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(phase, "Screenshot phase failed: {}", err);
                self.sink.failure_screenshot(&err);
                PhaseOutcome::Failed
            }
        }
    }

    async fn dispatch(&self, phase: &str, params: &LaunchParams) -> Result<PhaseOutcome> {
        let phase: Phase = phase.parse()?;
        debug!(phase = phase.as_str(), "Dispatching phase");

        match phase {
            Phase::Prepare => {
                info!("Preparing screenshot contexts");
                let contexts = CatalogWalker::new(self.channel.as_ref(), self.search_timeout)
                    .collect(self.selector.as_ref())
                    .await?;

                let count = contexts.len();
                self.sink.set_screenshot_stories(contexts)?;
                Ok(PhaseOutcome::Prepared { contexts: count })
            }
            Phase::Capture => {
                let target = params.capture_target()?;
                info!(%target, "Waiting for story to become ready");

                let listener = self.listen_for_ready(target);
                let target = listener.target();
                self.selector.select_story(&target.kind, &target.story);

                Ok(PhaseOutcome::Capturing(listener))
            }
        }
    }

    fn listen_for_ready(&self, target: StoryRef) -> CaptureListener {
        // Subscribe before spawning so no READY emitted after selection is missed
        let mut ready = self.channel.subscribe(&[EventTypes::COMPONENT_READY]);
        let sink = self.sink.clone();
        let story = target.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = ready.recv().await {
                match event.decode::<ComponentContext>() {
                    Ok(context) if context.belongs_to(&story) => {
                        info!(%story, "Target story ready");
                        sink.ready_component_screenshot();
                    }
                    Ok(_) => {}
                    Err(err) => debug!("Ignoring malformed ready event: {}", err),
                }
            }
            debug!(%story, "Channel closed, ready listener stopped");
        });

        CaptureListener { target, handle }
    }
}
