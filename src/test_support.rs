//! Fakes shared by unit tests

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::pool::{BufferAttributes, BufferPool, PixelBuffer, PixelFormat};
use crate::capture::traits::{AntialiasingMode, RasterImage, Resolution, SceneRenderer};
use crate::recorder::timestamp::MediaTime;
use crate::recorder::writer::{FinalizeCallback, MediaWriter, TrackSettings, WriterFactory};
use crate::utils::error::WriterError;

pub fn track() -> TrackSettings {
    TrackSettings {
        codec: "raw".to_string(),
        size: Resolution::new(8, 6),
        pixel_format: PixelFormat::Bgra8,
        timescale: 600,
    }
}

pub fn pool(max_buffers: usize) -> BufferPool {
    BufferPool::new(
        BufferAttributes {
            size: Resolution::new(8, 6),
            format: PixelFormat::Bgra8,
        },
        max_buffers,
    )
}

/// Renders a solid frame of the requested size
#[derive(Default)]
pub struct FakeRenderer {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl SceneRenderer for FakeRenderer {
    fn render(
        &self,
        _at_time: f64,
        size: Resolution,
        _antialiasing: AntialiasingMode,
    ) -> anyhow::Result<RasterImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("scene unavailable");
        }
        Ok(RasterImage::solid(size.width, size.height, [200, 100, 50, 255]))
    }
}

/// Scriptable in-memory writer
pub struct FakeWriter {
    ready: AtomicBool,
    fail_open: AtomicBool,
    fail_finalize: AtomicBool,
    append_delay_ms: AtomicU64,
    open_calls: AtomicUsize,
    input_finished: AtomicBool,
    path: Mutex<Option<PathBuf>>,
    appends: Mutex<Vec<MediaTime>>,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
            append_delay_ms: AtomicU64::new(0),
            open_calls: AtomicUsize::new(0),
            input_finished: AtomicBool::new(false),
            path: Mutex::new(None),
            appends: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    pub fn set_append_delay(&self, delay: Duration) {
        self.append_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn input_finished(&self) -> bool {
        self.input_finished.load(Ordering::SeqCst)
    }

    pub fn appended(&self) -> Vec<MediaTime> {
        self.appends.lock().clone()
    }
}

impl MediaWriter for FakeWriter {
    fn open(&self, path: &Path, _container: &str, _track: &TrackSettings) -> Result<(), WriterError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(WriterError::Unsupported("fake open failure".to_string()));
        }
        *self.path.lock() = Some(path.to_path_buf());
        Ok(())
    }

    fn start_session(&self, _base_time: MediaTime) -> Result<(), WriterError> {
        Ok(())
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn append(&self, _buffer: &PixelBuffer, presentation_time: MediaTime) -> bool {
        let delay = self.append_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.appends.lock().push(presentation_time);
        true
    }

    fn mark_input_finished(&self) {
        self.input_finished.store(true, Ordering::SeqCst);
    }

    fn finalize(&self, on_complete: FinalizeCallback) {
        let fail = self.fail_finalize.load(Ordering::SeqCst);
        let path = self.path.lock().clone();
        let frames = self.appends.lock().len();

        std::thread::spawn(move || {
            if fail {
                on_complete(Err(WriterError::Encode("fake finalize failure".to_string())));
                return;
            }
            if let Some(path) = path {
                let _ = std::fs::write(&path, format!("frames={}\n", frames));
            }
            on_complete(Ok(()));
        });
    }
}

/// Hands out `FakeWriter`s and remembers them
#[derive(Default)]
pub struct FakeWriterFactory {
    created: Mutex<Vec<Arc<FakeWriter>>>,
    fail_open: AtomicBool,
}

impl FakeWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writers created from now on fail to open
    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn created_writers(&self) -> Vec<Arc<FakeWriter>> {
        self.created.lock().clone()
    }

    pub fn latest(&self) -> Arc<FakeWriter> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("no writer created yet")
    }
}

impl WriterFactory for FakeWriterFactory {
    fn create(&self) -> Arc<dyn MediaWriter> {
        let writer = Arc::new(FakeWriter::new());
        writer.fail_open(self.fail_open.load(Ordering::SeqCst));
        self.created.lock().push(writer.clone());
        writer
    }
}
