use std::sync::Arc;

use serde::Serialize;

use super::artifact::{Artifact, PlayableRef};

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → requesting → recording → finalizing → idle
///            ↓
///          idle   (denied / unavailable / cancelled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    #[default]
    Idle,
    Requesting,
    Recording,
    Finalizing,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// States in which chunk events are accepted into the buffer.
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, Self::Recording | Self::Finalizing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

/// Observable state surface consumed by a UI layer.
#[derive(Debug, Clone, Default)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    /// True exactly when `state` is `Recording`.
    pub recording: bool,
    pub artifact: Option<Arc<Artifact>>,
    pub playable_reference: Option<PlayableRef>,
}
