//! Recording state management
//!
//! Defines the recording state machine and session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::stats::FrameStatsSnapshot;
use super::timestamp::{MediaTime, TimestampTracker};

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Writer is being started
    Preparing,
    /// Frames are being captured
    Recording,
    /// Input closed, container being finalized
    Finishing,
}

/// Run-time state of one recording.
///
/// Reset, not rebuilt, between recordings.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    /// Session identifier for log correlation
    pub id: Uuid,

    /// Lifecycle phase
    pub state: RecordingState,

    /// Anchor and last presentation timestamp
    pub timestamps: TimestampTracker,

    /// Wall-clock time recording started
    pub started_at: Option<DateTime<Utc>>,
}

impl CaptureSession {
    pub fn new(timescale: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RecordingState::Idle,
            timestamps: TimestampTracker::new(timescale),
            started_at: None,
        }
    }

    /// Begin a new recording with a fresh id and no anchor
    pub fn begin(&mut self) {
        self.id = Uuid::new_v4();
        self.timestamps.reset();
        self.started_at = Some(Utc::now());
        self.state = RecordingState::Recording;
    }

    /// Back to idle, keeping the timescale
    pub fn reset(&mut self) {
        self.timestamps.reset();
        self.started_at = None;
        self.state = RecordingState::Idle;
    }

    pub fn has_captured_frame(&self) -> bool {
        self.timestamps.has_captured()
    }

    pub fn anchor(&self) -> Option<MediaTime> {
        self.timestamps.anchor()
    }

    pub fn last_timestamp(&self) -> Option<MediaTime> {
        self.timestamps.last()
    }
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    /// Session identifier
    pub session_id: Uuid,

    /// Where the recording ended up
    pub output_path: PathBuf,

    /// Presentation time of the last appended frame in milliseconds
    pub duration_ms: f64,

    /// Frame counters for the session
    pub frames: FrameStatsSnapshot,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: DateTime<Utc>,
}
