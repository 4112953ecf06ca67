//! Scene Recorder - record a live rendered scene to a video file.
//!
//! Frames are pulled from a [`SceneRenderer`] on every display tick,
//! converted into pooled pixel buffers, stamped relative to the first
//! captured frame and appended to a [`MediaWriter`].

pub mod capture;
pub mod encoding;
pub mod recorder;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use capture::{AntialiasingMode, PixelFormat, RasterImage, Resolution, SceneRenderer};
pub use encoding::FrameStreamWriter;
pub use recorder::{
    RecorderBuilder, RecordingEvent, RecordingOptions, RecordingState, RecordingSummary,
    SceneRecorder, TickMode,
};
pub use utils::{FrameDrop, RecorderError, RecorderResult, WriterError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `scene_recorder=debug` filter. Calling
/// this twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scene_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
