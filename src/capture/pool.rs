//! Reusable pixel buffer pool
//!
//! Buffers are leased for one frame and go back to the free list when the
//! lease is dropped, which happens once the writer has consumed them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::traits::Resolution;

/// Pixel layout of pooled buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Bgra8,
    Rgba8,
    Argb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }

    /// Reorder one RGBA pixel into this format
    pub fn from_rgba(&self, px: [u8; 4]) -> [u8; 4] {
        let [r, g, b, a] = px;
        match self {
            PixelFormat::Bgra8 => [b, g, r, a],
            PixelFormat::Rgba8 => [r, g, b, a],
            PixelFormat::Argb8 => [a, r, g, b],
        }
    }

    /// Inverse of `from_rgba`
    pub fn to_rgba(&self, px: [u8; 4]) -> [u8; 4] {
        match self {
            PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgba8 => px,
            PixelFormat::Argb8 => [px[1], px[2], px[3], px[0]],
        }
    }
}

/// Geometry and format shared by every buffer in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAttributes {
    pub size: Resolution,
    pub format: PixelFormat,
}

impl BufferAttributes {
    pub fn bytes_per_row(&self) -> usize {
        self.size.width as usize * self.format.bytes_per_pixel()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes_per_row() * self.size.height as usize
    }
}

struct PoolInner {
    attributes: BufferAttributes,
    max_buffers: usize,
    free: Mutex<Vec<Vec<u8>>>,
    leased: Mutex<usize>,
}

/// Pool of equally sized pixel buffers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool that hands out at most `max_buffers` leases at once.
    ///
    /// Memory is allocated lazily on first lease and then recycled.
    pub fn new(attributes: BufferAttributes, max_buffers: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                attributes,
                max_buffers,
                free: Mutex::new(Vec::with_capacity(max_buffers)),
                leased: Mutex::new(0),
            }),
        }
    }

    pub fn attributes(&self) -> BufferAttributes {
        self.inner.attributes
    }

    /// Lease a buffer, or `None` when every buffer is checked out
    pub fn acquire(&self) -> Option<PixelBuffer> {
        {
            let mut leased = self.inner.leased.lock();
            if *leased >= self.inner.max_buffers {
                return None;
            }
            *leased += 1;
        }

        let data = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0; self.inner.attributes.byte_len()]);

        Some(PixelBuffer {
            data,
            pool: Arc::clone(&self.inner),
        })
    }

    /// Buffers currently leased out
    pub fn leased(&self) -> usize {
        *self.inner.leased.lock()
    }

    /// Buffers allocated and waiting for reuse
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }
}

/// A leased pixel buffer; returns itself to the pool on drop
pub struct PixelBuffer {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl PixelBuffer {
    pub fn attributes(&self) -> BufferAttributes {
        self.pool.attributes
    }

    pub fn size(&self) -> Resolution {
        self.pool.attributes.size
    }

    pub fn format(&self) -> PixelFormat {
        self.pool.attributes.format
    }

    pub fn bytes_per_row(&self) -> usize {
        self.pool.attributes.bytes_per_row()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("attributes", &self.pool.attributes)
            .finish()
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.pool.free.lock().push(data);
        let mut leased = self.pool.leased.lock();
        *leased = leased.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> BufferAttributes {
        BufferAttributes {
            size: Resolution::new(4, 2),
            format: PixelFormat::Bgra8,
        }
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let pool = BufferPool::new(attrs(), 2);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(a.data().len(), 4 * 2 * 4);
        assert!(pool.acquire().is_none());
        assert_eq!(pool.leased(), 2);
    }

    #[test]
    fn test_drop_recycles_memory() {
        let pool = BufferPool::new(attrs(), 1);
        {
            let mut buffer = pool.acquire().unwrap();
            buffer.data_mut()[0] = 42;
        }
        assert_eq!(pool.leased(), 0);
        assert_eq!(pool.available(), 1);

        // Same allocation comes back
        let buffer = pool.acquire().unwrap();
        assert_eq!(buffer.data()[0], 42);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pixel_format_round_trip() {
        let px = [10, 20, 30, 40];
        for format in [PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::Argb8] {
            assert_eq!(format.to_rgba(format.from_rgba(px)), px);
        }
        assert_eq!(PixelFormat::Bgra8.from_rgba(px), [30, 20, 10, 40]);
    }
}
