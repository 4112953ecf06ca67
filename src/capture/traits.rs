//! Capture trait definitions
//!
//! The renderer is an external capability: given its own scene state and a
//! time, it produces one raster image.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Antialiasing level requested from the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasingMode {
    None,
    Multisampling2x,
    #[default]
    Multisampling4x,
}

impl AntialiasingMode {
    /// Sample count per pixel
    pub fn sample_count(&self) -> u32 {
        match self {
            AntialiasingMode::None => 1,
            AntialiasingMode::Multisampling2x => 2,
            AntialiasingMode::Multisampling4x => 4,
        }
    }
}

/// A rendered frame: tightly packed RGBA8 rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// Image filled with a single RGBA color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, data }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// True when `data` matches the declared geometry
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * 4
    }
}

/// A rendered image and the host time it was captured at
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RasterImage,
    pub captured_at: Duration,
}

/// Produces a raster image of the scene at a given time.
///
/// Implementations own their scene state and must tolerate being called
/// repeatedly at arbitrary cadence from a worker thread.
pub trait SceneRenderer: Send + Sync {
    fn render(
        &self,
        at_time: f64,
        size: Resolution,
        antialiasing: AntialiasingMode,
    ) -> anyhow::Result<RasterImage>;
}

impl<F> SceneRenderer for F
where
    F: Fn(f64, Resolution, AntialiasingMode) -> anyhow::Result<RasterImage> + Send + Sync,
{
    fn render(
        &self,
        at_time: f64,
        size: Resolution,
        antialiasing: AntialiasingMode,
    ) -> anyhow::Result<RasterImage> {
        self(at_time, size, antialiasing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_image_is_well_formed() {
        let image = RasterImage::solid(4, 3, [1, 2, 3, 4]);
        assert!(image.is_well_formed());
        assert_eq!(&image.data[4..8], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_closure_renderer() {
        let renderer = |_t: f64, size: Resolution, _aa: AntialiasingMode| {
            Ok::<_, anyhow::Error>(RasterImage::solid(size.width, size.height, [0, 0, 0, 255]))
        };
        let image = renderer
            .render(0.5, Resolution::new(2, 2), AntialiasingMode::None)
            .unwrap();
        assert_eq!(image.resolution(), Resolution::new(2, 2));
    }

    #[test]
    fn test_antialiasing_serde() {
        let mode: AntialiasingMode = serde_json::from_str("\"multisampling2x\"").unwrap();
        assert_eq!(mode, AntialiasingMode::Multisampling2x);
        assert_eq!(mode.sample_count(), 2);
    }
}
