//! Recording coordinator
//!
//! Wires ticker -> renderer -> converter -> timestamp -> writer append and
//! manages the recording lifecycle. Render work runs on a serial queue so
//! frames are stamped in capture order; appends run on a concurrent queue so
//! a slow writer never stalls rendering.

use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::options::{default_working_dir, RecordingOptions};
use super::queue::{ConcurrentQueue, SerialQueue};
use super::state::{CaptureSession, RecordingState, RecordingSummary};
use super::stats::{FrameStats, FrameStatsSnapshot};
use super::timestamp::{Clock, HostClock, TimestampTracker};
use super::writer::{WriterFactory, WriterSession};
use crate::capture::converter::FrameConverter;
use crate::capture::pool::{BufferAttributes, BufferPool};
use crate::capture::ticker::CaptureTicker;
use crate::capture::traits::{Frame, RasterImage, SceneRenderer};
use crate::utils::error::{FrameDrop, RecorderError, RecorderResult};
use crate::utils::fs;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started
    Started { session_id: Uuid },
    /// Recording finished and the file is in place
    Finished(RecordingSummary),
    /// Session-level error occurred
    Error { code: String, message: String },
}

/// What drives capture attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// A ticker started with each recording, capped at the display refresh rate
    Display { refresh_hz: Option<u32> },
    /// The caller drives captures through [`SceneRecorder::request_capture`]
    Manual,
}

impl Default for TickMode {
    fn default() -> Self {
        TickMode::Display { refresh_hz: None }
    }
}

/// Live-preview observer, called with every rendered image
pub type PreviewHandler = Arc<dyn Fn(&RasterImage) + Send + Sync>;

/// Called with the final file location after a successful recording
pub type CompletionHandler = Arc<dyn Fn(&Path) + Send + Sync>;

/// Writer and buffer pool prepared for the next recording
struct Pipeline {
    writer: Arc<WriterSession>,
    pool: BufferPool,
}

struct Inner {
    options: RwLock<Arc<RecordingOptions>>,
    renderer: Arc<dyn SceneRenderer>,
    writers: Arc<dyn WriterFactory>,
    clock: Arc<dyn Clock>,
    tick_mode: TickMode,
    converter: FrameConverter,
    session: Mutex<CaptureSession>,
    pipeline: Mutex<Option<Pipeline>>,
    render_queue: SerialQueue,
    append_queue: Mutex<Arc<ConcurrentQueue>>,
    ticker: Mutex<Option<CaptureTicker>>,
    /// Scratch directory owned by this recorder under the default working dir
    working_dir: PathBuf,
    /// Where the most recent clean-up put the recording
    last_output: Mutex<Option<PathBuf>>,
    stats: Arc<FrameStats>,
    preview: RwLock<Option<PreviewHandler>>,
    completion: RwLock<Option<CompletionHandler>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

/// Builder for [`SceneRecorder`]
pub struct RecorderBuilder {
    options: RecordingOptions,
    renderer: Option<Arc<dyn SceneRenderer>>,
    writers: Option<Arc<dyn WriterFactory>>,
    clock: Option<Arc<dyn Clock>>,
    tick_mode: TickMode,
}

impl RecorderBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn SceneRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn writer_factory(mut self, writers: Arc<dyn WriterFactory>) -> Self {
        self.writers = Some(writers);
        self
    }

    /// Defaults to [`HostClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn tick_mode(mut self, tick_mode: TickMode) -> Self {
        self.tick_mode = tick_mode;
        self
    }

    /// Build and prepare the recorder. Must be called within a tokio runtime.
    pub fn build(self) -> RecorderResult<SceneRecorder> {
        self.options.validate()?;
        let renderer = self
            .renderer
            .ok_or_else(|| RecorderError::Config("renderer not set".to_string()))?;
        let writers = self
            .writers
            .ok_or_else(|| RecorderError::Config("writer factory not set".to_string()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(HostClock::new()));
        let (event_tx, _) = broadcast::channel(100);

        let recorder = SceneRecorder {
            inner: Arc::new(Inner {
                session: Mutex::new(CaptureSession::new(self.options.timescale)),
                append_queue: Mutex::new(Arc::new(ConcurrentQueue::new(
                    "append",
                    self.options.append_workers,
                ))),
                options: RwLock::new(Arc::new(self.options)),
                renderer,
                writers,
                clock,
                tick_mode: self.tick_mode,
                converter: FrameConverter::new(),
                pipeline: Mutex::new(None),
                render_queue: SerialQueue::new("render"),
                ticker: Mutex::new(None),
                working_dir: default_working_dir().join(Uuid::new_v4().to_string()),
                last_output: Mutex::new(None),
                stats: Arc::new(FrameStats::default()),
                preview: RwLock::new(None),
                completion: RwLock::new(None),
                event_tx,
            }),
        };

        recorder.prepare()?;
        Ok(recorder)
    }
}

/// Records a rendered scene into a timestamped video file
#[derive(Clone)]
pub struct SceneRecorder {
    inner: Arc<Inner>,
}

impl SceneRecorder {
    pub fn builder(options: RecordingOptions) -> RecorderBuilder {
        RecorderBuilder {
            options,
            renderer: None,
            writers: None,
            clock: None,
            tick_mode: TickMode::default(),
        }
    }

    /// Current options
    pub fn options(&self) -> Arc<RecordingOptions> {
        self.inner.options()
    }

    /// Replace the options and re-prepare. Only allowed while idle.
    pub fn set_options(&self, options: RecordingOptions) -> RecorderResult<()> {
        options.validate()?;
        let mut session = self.inner.session.lock();
        if session.state != RecordingState::Idle {
            return Err(RecorderError::RecorderBusy);
        }
        *self.inner.options.write() = Arc::new(options);
        self.inner.prepare_pipeline(&mut session)
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.inner.session.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Identifier of the current or most recent session
    pub fn session_id(&self) -> Uuid {
        self.inner.session.lock().id
    }

    pub fn frame_stats(&self) -> FrameStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn set_preview_handler<F>(&self, handler: F)
    where
        F: Fn(&RasterImage) + Send + Sync + 'static,
    {
        *self.inner.preview.write() = Some(Arc::new(handler));
    }

    pub fn set_completion_handler<F>(&self, handler: F)
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        *self.inner.completion.write() = Some(Arc::new(handler));
    }

    /// Prepare a fresh writer and buffer pool. Idempotent while idle.
    pub fn prepare(&self) -> RecorderResult<()> {
        let mut session = self.inner.session.lock();
        if session.state != RecordingState::Idle {
            return Err(RecorderError::RecorderBusy);
        }
        self.inner.prepare_pipeline(&mut session)
    }

    /// Start recording
    pub async fn start_writing(&self) -> RecorderResult<()> {
        let writer = {
            let mut session = self.inner.session.lock();
            if session.state != RecordingState::Idle {
                return Err(RecorderError::RecorderBusy);
            }
            let pipeline = self.inner.pipeline.lock();
            let Some(pipeline) = pipeline.as_ref() else {
                return Err(RecorderError::StartFailed(
                    "recorder is not prepared".to_string(),
                ));
            };
            session.state = RecordingState::Preparing;
            pipeline.writer.clone()
        };

        // Run the rest on its own task so a dropped caller cannot strand the
        // recorder in `Preparing`
        let this = self.clone();
        tokio::spawn(async move { this.complete_start(writer).await })
            .await
            .unwrap_or_else(|e| Err(RecorderError::StartFailed(e.to_string())))
    }

    async fn complete_start(&self, writer: Arc<WriterSession>) -> RecorderResult<()> {
        let started = tokio::task::spawn_blocking(move || writer.start())
            .await
            .unwrap_or_else(|e| Err(RecorderError::StartFailed(e.to_string())));

        if let Err(e) = started {
            self.inner.session.lock().state = RecordingState::Idle;
            self.inner.emit_error(&e);
            return Err(e);
        }

        self.inner.stats.reset();
        let session_id = {
            let mut session = self.inner.session.lock();
            session.begin();
            session.id
        };

        if let TickMode::Display { refresh_hz } = self.inner.tick_mode {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let ticker = CaptureTicker::start(refresh_hz, self.options().fps, move || {
                if let Some(inner) = weak.upgrade() {
                    Inner::request_capture(&inner);
                }
            });
            *self.inner.ticker.lock() = Some(ticker);
        }

        tracing::info!("Recording started (session {})", session_id);
        let _ = self.inner.event_tx.send(RecordingEvent::Started { session_id });
        Ok(())
    }

    /// Stop recording, finalize the file and return where it ended up
    pub async fn finish_writing(&self) -> RecorderResult<PathBuf> {
        let writer = {
            let mut session = self.inner.session.lock();
            if session.state != RecordingState::Recording {
                return Err(RecorderError::NotRecording);
            }
            session.state = RecordingState::Finishing;
            let pipeline = self.inner.pipeline.lock();
            match pipeline.as_ref() {
                Some(pipeline) => pipeline.writer.clone(),
                None => {
                    session.state = RecordingState::Idle;
                    return Err(RecorderError::NotRecording);
                }
            }
        };
        tracing::info!("Stopping recording");

        let this = self.clone();
        tokio::spawn(async move { this.complete_finish(writer).await })
            .await
            .unwrap_or_else(|e| Err(RecorderError::Finalize(e.to_string())))
    }

    async fn complete_finish(&self, writer: Arc<WriterSession>) -> RecorderResult<PathBuf> {
        if let Some(ticker) = self.inner.ticker.lock().take() {
            ticker.stop();
        }

        // Let already dispatched frames land before closing input
        self.drain().await;

        let finalized = match writer.finish() {
            Ok(done) => match done.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(RecorderError::Finalize(e.to_string())),
                Err(_) => Err(RecorderError::Finalize(
                    "writer dropped its completion callback".to_string(),
                )),
            },
            Err(e) => Err(e),
        };

        let outcome = finalized.map(|()| self.clean_up());

        let summary = {
            let mut session = self.inner.session.lock();
            let summary = outcome.as_ref().ok().map(|path| RecordingSummary {
                session_id: session.id,
                output_path: path.clone(),
                duration_ms: session
                    .last_timestamp()
                    .map(|t| t.as_millis_f64())
                    .unwrap_or(0.0),
                frames: self.inner.stats.snapshot(),
                started_at: session.started_at,
                finished_at: chrono::Utc::now(),
            });
            if let Err(e) = self.inner.prepare_pipeline(&mut session) {
                tracing::error!("Failed to prepare next recording: {}", e);
                *self.inner.pipeline.lock() = None;
            }
            session.reset();
            summary
        };

        match (&outcome, summary) {
            (Ok(path), Some(summary)) => {
                tracing::info!(
                    "Recording finished: {:?}, {} frames, {:.0}ms",
                    path,
                    summary.frames.appended,
                    summary.duration_ms
                );
                let _ = self.inner.event_tx.send(RecordingEvent::Finished(summary));
                let completion = self.inner.completion.read().clone();
                if let Some(handler) = completion {
                    handler(path.as_path());
                }
            }
            (Err(e), _) => {
                tracing::error!("Recording failed to finish: {}", e);
                self.inner.emit_error(e);
            }
            _ => {}
        }

        outcome
    }

    /// Move the intermediate file to the output location.
    ///
    /// An existing output is replaced when `overwrite_existing` is set;
    /// otherwise the recording lands next to it under a numbered name. If the
    /// move fails the intermediate path is returned. With no intermediate
    /// file left, nothing is touched and the last recording's path is returned.
    pub fn clean_up(&self) -> PathBuf {
        let options = self.options();
        let source = self.inner.intermediate_path(&options);

        if !source.exists() {
            let landed = self.inner.last_output.lock().clone();
            return match landed {
                Some(path) if path.exists() => path,
                _ if options.output_path.exists() => options.output_path.clone(),
                _ => source,
            };
        }

        let mut target = options.output_path.clone();
        if target.exists() && !options.overwrite_existing {
            target = numbered_sibling(&target);
        }

        match fs::move_file(&source, &target) {
            Ok(()) => {
                *self.inner.last_output.lock() = Some(target.clone());
                target
            }
            Err(e) => {
                tracing::warn!("Failed to move {:?} to {:?}: {}", source, target, e);
                source
            }
        }
    }

    /// Where the writer puts the recording before clean-up
    pub fn intermediate_path(&self) -> PathBuf {
        self.inner.intermediate_path(&self.options())
    }

    /// Queue one capture attempt on the render queue. Never blocks.
    pub fn request_capture(&self) {
        Inner::request_capture(&self.inner);
    }

    /// Wait for queued captures and in-flight appends to complete
    pub async fn drain(&self) {
        self.inner.render_queue.flush().await;
        let append_queue = self.inner.append_queue.lock().clone();
        append_queue.wait_idle().await;
    }
}

impl Inner {
    fn options(&self) -> Arc<RecordingOptions> {
        self.options.read().clone()
    }

    /// Intermediate files under the shared default working dir go into this
    /// recorder's own subdirectory
    fn intermediate_path(&self, options: &RecordingOptions) -> PathBuf {
        if !options.uses_default_working_dir() {
            return options.intermediate_path.clone();
        }
        match options.intermediate_path.file_name() {
            Some(name) => self.working_dir.join(name),
            None => self.working_dir.join("video-only.scnf"),
        }
    }

    fn emit_error(&self, error: &RecorderError) {
        let _ = self.event_tx.send(RecordingEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }

    /// Fresh writer, pool and append queue for the next recording
    fn prepare_pipeline(&self, session: &mut CaptureSession) -> RecorderResult<()> {
        let options = self.options();

        let intermediate_path = self.intermediate_path(&options);

        if options.uses_default_working_dir() {
            fs::clear_directory(&self.working_dir)?;
        } else {
            fs::delete_file(&intermediate_path)?;
            if let Some(dir) = intermediate_path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
            }
        }

        let writer = WriterSession::new(
            self.writers.create(),
            intermediate_path.clone(),
            options.container.clone(),
            options.track_settings(),
        );
        let pool = BufferPool::new(
            BufferAttributes {
                size: options.video_size,
                format: options.pixel_format,
            },
            options.buffer_pool_size,
        );

        *self.pipeline.lock() = Some(Pipeline {
            writer: Arc::new(writer),
            pool,
        });
        *self.append_queue.lock() = Arc::new(ConcurrentQueue::new("append", options.append_workers));
        session.timestamps = TimestampTracker::new(options.timescale);

        tracing::debug!(
            "Prepared writer for {} @ {} fps -> {:?}",
            options.video_size,
            options.fps,
            intermediate_path
        );
        Ok(())
    }

    fn request_capture(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        this.render_queue.dispatch(move || inner.capture_frame());
    }

    fn drop_frame(&self, reason: FrameDrop) {
        tracing::debug!("Dropped frame: {}", reason);
        self.stats.record_drop(reason);
    }

    /// One capture attempt; runs on the render queue
    fn capture_frame(&self) {
        if self.session.lock().state != RecordingState::Recording {
            return;
        }
        let (writer, pool) = match self.pipeline.lock().as_ref() {
            Some(pipeline) => (pipeline.writer.clone(), pipeline.pool.clone()),
            None => return,
        };

        if !writer.is_accepting() {
            self.drop_frame(FrameDrop::NotReady);
            return;
        }

        let options = self.options();
        let Some(captured_at) = self.clock.now() else {
            self.drop_frame(FrameDrop::InvalidTimestamp);
            return;
        };

        let image = match self.renderer.render(
            captured_at.as_secs_f64(),
            options.video_size,
            options.antialiasing,
        ) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Scene render failed: {}", e);
                self.drop_frame(FrameDrop::RenderFailed);
                return;
            }
        };
        let frame = Frame { image, captured_at };

        let preview = self.preview.read().clone();
        if let Some(preview) = preview {
            preview(&frame.image);
        }

        let Some(mut buffer) = pool.acquire() else {
            self.drop_frame(FrameDrop::BufferUnavailable);
            return;
        };
        if let Err(reason) = self.converter.convert(&frame.image, &mut buffer) {
            self.drop_frame(reason);
            return;
        }

        let stamped = self.session.lock().timestamps.stamp(Some(frame.captured_at));
        let presentation_time = match stamped {
            Ok(pts) => pts,
            Err(reason) => {
                self.drop_frame(reason);
                return;
            }
        };
        self.stats.record_captured();

        let stats = self.stats.clone();
        let append_queue = self.append_queue.lock().clone();
        append_queue.dispatch(move || {
            if writer.append(&buffer, presentation_time) {
                stats.record_appended();
            } else {
                tracing::debug!("Writer rejected frame at {:?}", presentation_time);
                stats.record_drop(FrameDrop::AppendRejected);
            }
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Only succeeds when empty, so an unmoved recording is never lost
        let _ = std::fs::remove_dir(&self.working_dir);
    }
}

/// `out.scnf` -> `out-1.scnf`, `out-2.scnf`, ... whichever is free first
fn numbered_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    (1u32..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            path.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
