//! Frame capture
//!
//! Renderer contract, pixel buffer pool, frame conversion and the capture ticker.

pub mod converter;
pub mod pool;
pub mod ticker;
pub mod traits;

pub use converter::FrameConverter;
pub use pool::{BufferAttributes, BufferPool, PixelBuffer, PixelFormat};
pub use ticker::CaptureTicker;
pub use traits::{AntialiasingMode, Frame, RasterImage, Resolution, SceneRenderer};
