//! Presentation timestamps
//!
//! Frames are stamped relative to the first frame captured in a session,
//! so the first appended frame always lands at zero.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

use crate::utils::error::FrameDrop;

/// A rational time value: `value / timescale` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const fn zero(timescale: i32) -> Self {
        Self { value: 0, timescale }
    }

    /// Convert a duration, truncating to the timescale's resolution.
    ///
    /// Returns `None` for a non-positive timescale or on overflow.
    pub fn from_duration(duration: Duration, timescale: i32) -> Option<Self> {
        if timescale <= 0 {
            return None;
        }
        let value = duration.as_nanos().checked_mul(timescale as u128)? / 1_000_000_000;
        Some(Self {
            value: i64::try_from(value).ok()?,
            timescale,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.timescale > 0
    }

    /// `self - other`, both in the same timescale
    pub fn checked_sub(&self, other: MediaTime) -> Option<MediaTime> {
        if self.timescale != other.timescale || !self.is_valid() {
            return None;
        }
        Some(Self {
            value: self.value.checked_sub(other.value)?,
            timescale: self.timescale,
        })
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn as_millis_f64(&self) -> f64 {
        self.as_secs_f64() * 1000.0
    }
}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.is_valid() || !other.is_valid() {
            return None;
        }
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        Some(lhs.cmp(&rhs))
    }
}

/// Source of the host's monotonic time.
///
/// `None` means the clock is unavailable and the frame must be skipped.
pub trait Clock: Send + Sync {
    fn now(&self) -> Option<Duration>;
}

/// Monotonic clock measured from its creation
#[derive(Debug, Clone)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now(&self) -> Option<Duration> {
        Some(self.origin.elapsed())
    }
}

/// Stepped clock for offline rendering and tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Option<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Some(Duration::ZERO)),
        }
    }

    pub fn set(&self, now: Duration) {
        *self.now.lock() = Some(now);
    }

    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock();
        *now = Some(now.unwrap_or_default() + step);
    }

    /// Make the clock report itself unavailable
    pub fn invalidate(&self) {
        *self.now.lock() = None;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<Duration> {
        *self.now.lock()
    }
}

/// Per-session presentation time bookkeeping
#[derive(Debug, Clone)]
pub struct TimestampTracker {
    timescale: i32,
    anchor: Option<MediaTime>,
    last: Option<MediaTime>,
}

impl TimestampTracker {
    pub fn new(timescale: i32) -> Self {
        Self {
            timescale,
            anchor: None,
            last: None,
        }
    }

    /// Compute the presentation time of a frame captured at `captured_at`.
    ///
    /// The first stamped frame becomes the anchor. Frames that would not
    /// advance past the previous timestamp are rejected.
    pub fn stamp(&mut self, captured_at: Option<Duration>) -> Result<MediaTime, FrameDrop> {
        let now = captured_at
            .and_then(|t| MediaTime::from_duration(t, self.timescale))
            .ok_or(FrameDrop::InvalidTimestamp)?;

        let anchor = *self.anchor.get_or_insert(now);
        let pts = now
            .checked_sub(anchor)
            .filter(|pts| pts.value >= 0)
            .ok_or(FrameDrop::InvalidTimestamp)?;

        if let Some(last) = self.last {
            if pts.value <= last.value {
                return Err(FrameDrop::InvalidTimestamp);
            }
        }

        self.last = Some(pts);
        Ok(pts)
    }

    pub fn anchor(&self) -> Option<MediaTime> {
        self.anchor
    }

    pub fn last(&self) -> Option<MediaTime> {
        self.last
    }

    /// Whether a frame has been stamped this session
    pub fn has_captured(&self) -> bool {
        self.last.is_some()
    }

    pub fn timescale(&self) -> i32 {
        self.timescale
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.last = None;
    }
}
