//! Recording options
//!
//! Immutable per session; swap a whole new value in while idle to change them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::writer::TrackSettings;
use crate::capture::pool::PixelFormat;
use crate::capture::traits::{AntialiasingMode, Resolution};
use crate::utils::error::{RecorderError, RecorderResult};

/// Recorder-owned scratch directory for intermediate files
pub fn default_working_dir() -> PathBuf {
    std::env::temp_dir().join("scene-recorder").join("tmp")
}

/// Configuration for a recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingOptions {
    /// Target frames per second
    pub fps: u32,

    /// Output video geometry
    pub video_size: Resolution,

    /// Ticks per second for presentation-time arithmetic
    pub timescale: i32,

    /// Codec identifier passed to the writer
    pub codec: String,

    /// Container format identifier passed to the writer
    pub container: String,

    /// Final location of the recording
    pub output_path: PathBuf,

    /// Where the writer writes while recording
    pub intermediate_path: PathBuf,

    /// Replace an existing file at `output_path` during clean-up
    pub overwrite_existing: bool,

    /// Renderer antialiasing level
    pub antialiasing: AntialiasingMode,

    /// Pixel layout the writer expects
    pub pixel_format: PixelFormat,

    /// Maximum pixel buffers leased at once
    pub buffer_pool_size: usize,

    /// Workers performing writer appends
    pub append_workers: usize,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        let root = std::env::temp_dir().join("scene-recorder");
        Self {
            fps: 30,
            video_size: Resolution::new(640, 480),
            timescale: 600,
            codec: "png".to_string(),
            container: "scnf".to_string(),
            output_path: root.join("output.scnf"),
            intermediate_path: default_working_dir().join("video-only.scnf"),
            overwrite_existing: true,
            antialiasing: AntialiasingMode::default(),
            pixel_format: PixelFormat::default(),
            buffer_pool_size: 6,
            append_workers: 2,
        }
    }
}

impl RecordingOptions {
    /// Load options from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> RecorderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    pub fn save(&self, path: &Path) -> RecorderResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> RecorderResult<()> {
        if self.fps == 0 {
            return Err(RecorderError::Config("fps must be positive".to_string()));
        }
        if self.video_size.width == 0 || self.video_size.height == 0 {
            return Err(RecorderError::Config(format!(
                "invalid video size {}",
                self.video_size
            )));
        }
        if self.timescale <= 0 {
            return Err(RecorderError::Config("timescale must be positive".to_string()));
        }
        if self.codec.trim().is_empty() || self.container.trim().is_empty() {
            return Err(RecorderError::Config(
                "codec and container must be set".to_string(),
            ));
        }
        if self.output_path == self.intermediate_path {
            return Err(RecorderError::Config(
                "output and intermediate paths must differ".to_string(),
            ));
        }
        if self.buffer_pool_size == 0 || self.append_workers == 0 {
            return Err(RecorderError::Config(
                "buffer pool size and append workers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Track settings handed to the writer
    pub fn track_settings(&self) -> TrackSettings {
        TrackSettings {
            codec: self.codec.clone(),
            size: self.video_size,
            pixel_format: self.pixel_format,
            timescale: self.timescale,
        }
    }

    /// True when the intermediate file lives in the recorder's own scratch dir
    pub fn uses_default_working_dir(&self) -> bool {
        self.intermediate_path.parent() == Some(default_working_dir().as_path())
    }
}
