//! Recording system module
//!
//! This module implements the capture-to-encode pipeline:
//! - SceneRecorder to orchestrate capture, conversion and appends
//! - WriterSession state machine around a MediaWriter
//! - Timestamp tracking relative to the first captured frame

pub mod coordinator;
pub mod options;
pub mod queue;
pub mod state;
pub mod stats;
pub mod timestamp;
pub mod writer;

pub use coordinator::{
    CompletionHandler, PreviewHandler, RecorderBuilder, RecordingEvent, SceneRecorder, TickMode,
};
pub use options::RecordingOptions;
pub use queue::{ConcurrentQueue, SerialQueue};
pub use state::{CaptureSession, RecordingState, RecordingSummary};
pub use stats::{FrameStats, FrameStatsSnapshot};
pub use timestamp::{Clock, HostClock, ManualClock, MediaTime, TimestampTracker};
pub use writer::{
    FinalizeCallback, MediaWriter, TrackSettings, WriterFactory, WriterSession, WriterState,
};
