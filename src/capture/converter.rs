//! Raster image to pixel buffer conversion

use super::pool::PixelBuffer;
use super::traits::RasterImage;
use crate::utils::error::FrameDrop;

/// Draws RGBA raster images into pooled buffers in the buffer's pixel format.
///
/// Images whose size differs from the buffer are resampled with
/// nearest-neighbour filtering.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameConverter;

impl FrameConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, image: &RasterImage, buffer: &mut PixelBuffer) -> Result<(), FrameDrop> {
        if !image.is_well_formed() || image.width == 0 || image.height == 0 {
            tracing::warn!(
                "Malformed raster image: {}x{} with {} bytes",
                image.width,
                image.height,
                image.data.len()
            );
            return Err(FrameDrop::ConversionFailed);
        }

        let size = buffer.size();
        let format = buffer.format();
        let bytes_per_row = buffer.bytes_per_row();
        let src_width = image.width as usize;
        let same_size = size == image.resolution();
        let dst = buffer.data_mut();

        for y in 0..size.height as usize {
            let src_y = if same_size {
                y
            } else {
                y * image.height as usize / size.height as usize
            };
            let row = &mut dst[y * bytes_per_row..(y + 1) * bytes_per_row];

            for (x, out) in row.chunks_exact_mut(4).enumerate() {
                let src_x = if same_size {
                    x
                } else {
                    x * src_width / size.width as usize
                };
                let offset = (src_y * src_width + src_x) * 4;
                let px = [
                    image.data[offset],
                    image.data[offset + 1],
                    image.data[offset + 2],
                    image.data[offset + 3],
                ];
                out.copy_from_slice(&format.from_rgba(px));
            }
        }

        Ok(())
    }
}
