//! Outbound signals to the capture driver

use crate::types::ComponentContext;
use crate::{AddonError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;

pub const MANIFEST_FILE_NAME: &str = "contexts.json";

/// Receiver of everything the addon reports.
///
/// Injected into the phase controller; the capture driver decides what each
/// signal means for it.
pub trait ScreenshotSink: Send + Sync {
    /// Called once in the prepare phase with every mounted wrapper context
    fn set_screenshot_stories(&self, contexts: Vec<ComponentContext>) -> Result<()>;

    /// Called in the capture phase whenever the target story reports ready.
    /// May fire more than once per run.
    fn ready_component_screenshot(&self);

    /// Called on any failure in either phase
    fn failure_screenshot(&self, error: &AddonError);
}

/// Contexts file written by [`ManifestSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextManifest {
    /// Timestamp of manifest generation
    pub generated_at: String,

    /// Mounted wrapper contexts in catalog order
    pub contexts: Vec<ComponentContext>,
}

impl ContextManifest {
    pub fn new(contexts: Vec<ComponentContext>) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            contexts,
        }
    }
}

/// Last signal seen by a [`ManifestSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkStatus {
    Pending,
    Prepared { contexts: usize, path: PathBuf },
    Ready { signals: usize },
    Failed(String),
}

/// Sink that writes prepare results to a JSON manifest on disk and exposes
/// every signal as a watchable status.
pub struct ManifestSink {
    output_dir: PathBuf,
    status: watch::Sender<SinkStatus>,
}

impl ManifestSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;

        let (status, _) = watch::channel(SinkStatus::Pending);
        Ok(Self { output_dir, status })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn status(&self) -> SinkStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes, e.g. to wait for a ready signal
    pub fn subscribe(&self) -> watch::Receiver<SinkStatus> {
        self.status.subscribe()
    }

    pub fn read_manifest(&self) -> Result<ContextManifest> {
        let content = std::fs::read_to_string(self.manifest_path())?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ScreenshotSink for ManifestSink {
    fn set_screenshot_stories(&self, contexts: Vec<ComponentContext>) -> Result<()> {
        let count = contexts.len();
        let manifest = ContextManifest::new(contexts);
        let path = self.manifest_path();

        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(&path, json)?;

        info!(contexts = count, path = %path.display(), "Wrote screenshot contexts");
        self.status.send_replace(SinkStatus::Prepared {
            contexts: count,
            path,
        });
        Ok(())
    }

    fn ready_component_screenshot(&self) {
        self.status.send_modify(|status| match status {
            SinkStatus::Ready { signals } => *signals += 1,
            other => *other = SinkStatus::Ready { signals: 1 },
        });
    }

    fn failure_screenshot(&self, error: &AddonError) {
        self.status.send_replace(SinkStatus::Failed(error.to_string()));
    }
}
