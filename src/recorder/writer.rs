//! Writer session
//!
//! Wraps an external media writer in the `Idle -> Writing -> Finishing -> Idle`
//! state machine. The finalize callback runs on the writer's own thread and
//! races with `start`, so the state lives behind a mutex.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::timestamp::MediaTime;
use crate::capture::pool::{PixelBuffer, PixelFormat};
use crate::capture::traits::Resolution;
use crate::utils::error::{RecorderError, RecorderResult, WriterError};

/// Settings for the single video track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub codec: String,
    pub size: Resolution,
    pub pixel_format: PixelFormat,
    pub timescale: i32,
}

/// Completion callback handed to [`MediaWriter::finalize`]
pub type FinalizeCallback = Box<dyn FnOnce(Result<(), WriterError>) + Send + 'static>;

/// External media container writer.
///
/// Buffers are associated with the timestamp passed to `append`, never with
/// arrival order, so appends may be issued from several threads.
pub trait MediaWriter: Send + Sync {
    fn open(&self, path: &Path, container: &str, track: &TrackSettings) -> Result<(), WriterError>;

    fn start_session(&self, base_time: MediaTime) -> Result<(), WriterError>;

    fn is_ready_for_more_data(&self) -> bool;

    fn append(&self, buffer: &PixelBuffer, presentation_time: MediaTime) -> bool;

    fn mark_input_finished(&self);

    /// Complete the container asynchronously and report through `on_complete`
    fn finalize(&self, on_complete: FinalizeCallback);
}

/// Creates a fresh writer for every prepared session
pub trait WriterFactory: Send + Sync {
    fn create(&self) -> Arc<dyn MediaWriter>;
}

impl<F> WriterFactory for F
where
    F: Fn() -> Arc<dyn MediaWriter> + Send + Sync,
{
    fn create(&self) -> Arc<dyn MediaWriter> {
        self()
    }
}

/// Write-session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterState {
    Idle,
    Writing,
    Finishing,
    Failed,
}

/// One prepared writer plus its state machine
pub struct WriterSession {
    writer: Arc<dyn MediaWriter>,
    path: PathBuf,
    container: String,
    track: TrackSettings,
    state: Arc<Mutex<WriterState>>,
}

impl WriterSession {
    pub fn new(
        writer: Arc<dyn MediaWriter>,
        path: PathBuf,
        container: String,
        track: TrackSettings,
    ) -> Self {
        Self {
            writer,
            path,
            container,
            track,
            state: Arc::new(Mutex::new(WriterState::Idle)),
        }
    }

    pub fn state(&self) -> WriterState {
        *self.state.lock()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the writer and begin a session at time zero
    pub fn start(&self) -> RecorderResult<()> {
        let mut state = self.state.lock();
        match *state {
            WriterState::Idle => {}
            WriterState::Writing | WriterState::Finishing => return Err(RecorderError::RecorderBusy),
            WriterState::Failed => {
                return Err(RecorderError::StartFailed(
                    "writer session failed earlier, prepare a new one".to_string(),
                ))
            }
        }

        let opened = self
            .writer
            .open(&self.path, &self.container, &self.track)
            .and_then(|_| self.writer.start_session(MediaTime::zero(self.track.timescale)));

        if let Err(e) = opened {
            tracing::error!("Writer failed to start at {:?}: {}", self.path, e);
            *state = WriterState::Failed;
            return Err(RecorderError::StartFailed(e.to_string()));
        }

        *state = WriterState::Writing;
        tracing::debug!("Writer session started at {:?}", self.path);
        Ok(())
    }

    /// Whether a frame produced now would be accepted
    pub fn is_accepting(&self) -> bool {
        *self.state.lock() == WriterState::Writing && self.writer.is_ready_for_more_data()
    }

    /// Append a buffer. Returns false when the frame was dropped.
    pub fn append(&self, buffer: &PixelBuffer, presentation_time: MediaTime) -> bool {
        if !self.is_accepting() {
            return false;
        }
        self.writer.append(buffer, presentation_time)
    }

    /// Finish input and finalize the container.
    ///
    /// The returned receiver resolves once the writer's completion callback
    /// has run and the state has moved back to `Idle` (or `Failed`).
    pub fn finish(&self) -> RecorderResult<oneshot::Receiver<Result<(), WriterError>>> {
        {
            let mut state = self.state.lock();
            if *state != WriterState::Writing {
                return Err(RecorderError::NotRecording);
            }
            *state = WriterState::Finishing;
        }

        self.writer.mark_input_finished();

        let (tx, rx) = oneshot::channel();
        let state = self.state.clone();
        self.writer.finalize(Box::new(move |result| {
            *state.lock() = match result {
                Ok(()) => WriterState::Idle,
                Err(_) => WriterState::Failed,
            };
            let _ = tx.send(result);
        }));

        Ok(rx)
    }
}
