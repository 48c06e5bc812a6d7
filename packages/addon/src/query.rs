//! Launch parameters read from the host page location

use crate::constants::PhaseTypes;
use crate::types::StoryRef;
use crate::{AddonError, Result};
use std::borrow::Cow;
use std::str::FromStr;
use url::{form_urlencoded, Url};

pub const PHASE_PARAM: &str = "chrome-screenshot";
pub const SELECT_KIND_PARAM: &str = "selectKind";
pub const SELECT_STORY_PARAM: &str = "selectStory";

/// Operating mode requested by the capture driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Enumerate every mounted wrapper in the catalog
    Prepare,

    /// Wait for one story's wrappers to become ready
    Capture,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => PhaseTypes::PREPARE,
            Phase::Capture => PhaseTypes::CAPTURE,
        }
    }
}

impl FromStr for Phase {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            PhaseTypes::PREPARE => Ok(Phase::Prepare),
            PhaseTypes::CAPTURE => Ok(Phase::Capture),
            other => Err(AddonError::UnknownPhase(other.to_string())),
        }
    }
}

/// Parsed `chrome-screenshot`, `selectKind` and `selectStory` parameters.
///
/// Empty values are treated as absent. When a key repeats, the first value
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub phase: Option<String>,
    pub select_kind: Option<String>,
    pub select_story: Option<String>,
}

impl LaunchParams {
    /// Parse from a full URL, or from anything containing a `?query` part
    pub fn from_location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) => Self::from_pairs(url.query_pairs()),
            Err(_) => {
                let query = location
                    .split_once('?')
                    .map(|(_, query)| query)
                    .unwrap_or(location);
                let query = query.split('#').next().unwrap_or_default();
                Self::from_query(query)
            }
        }
    }

    /// Parse a bare query string, with or without the leading `?`
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut params = Self::default();

        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }

            let slot = match key.as_ref() {
                PHASE_PARAM => &mut params.phase,
                SELECT_KIND_PARAM => &mut params.select_kind,
                SELECT_STORY_PARAM => &mut params.select_story,
                _ => continue,
            };

            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }

    /// The story a capture run waits for
    pub fn capture_target(&self) -> Result<StoryRef> {
        match (&self.select_kind, &self.select_story) {
            (Some(kind), Some(story)) => Ok(StoryRef::new(kind, story)),
            _ => Err(AddonError::MissingCaptureTarget),
        }
    }
}
