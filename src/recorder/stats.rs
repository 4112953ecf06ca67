//! Frame counters
//!
//! Dropped frames never fail a session; these counters are the only place
//! the individual drop reasons are visible.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::error::FrameDrop;

#[derive(Debug, Default)]
pub struct FrameStats {
    captured: AtomicU64,
    appended: AtomicU64,
    not_ready: AtomicU64,
    buffer_unavailable: AtomicU64,
    invalid_timestamp: AtomicU64,
    render_failed: AtomicU64,
    conversion_failed: AtomicU64,
    append_rejected: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStatsSnapshot {
    pub captured: u64,
    pub appended: u64,
    pub not_ready: u64,
    pub buffer_unavailable: u64,
    pub invalid_timestamp: u64,
    pub render_failed: u64,
    pub conversion_failed: u64,
    pub append_rejected: u64,
}

impl FrameStatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.not_ready
            + self.buffer_unavailable
            + self.invalid_timestamp
            + self.render_failed
            + self.conversion_failed
            + self.append_rejected
    }
}

impl FrameStats {
    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_appended(&self) {
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, reason: FrameDrop) {
        let counter = match reason {
            FrameDrop::NotReady => &self.not_ready,
            FrameDrop::BufferUnavailable => &self.buffer_unavailable,
            FrameDrop::InvalidTimestamp => &self.invalid_timestamp,
            FrameDrop::RenderFailed => &self.render_failed,
            FrameDrop::ConversionFailed => &self.conversion_failed,
            FrameDrop::AppendRejected => &self.append_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            appended: self.appended.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            buffer_unavailable: self.buffer_unavailable.load(Ordering::Relaxed),
            invalid_timestamp: self.invalid_timestamp.load(Ordering::Relaxed),
            render_failed: self.render_failed.load(Ordering::Relaxed),
            conversion_failed: self.conversion_failed.load(Ordering::Relaxed),
            append_rejected: self.append_rejected.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.captured,
            &self.appended,
            &self.not_ready,
            &self.buffer_unavailable,
            &self.invalid_timestamp,
            &self.render_failed,
            &self.conversion_failed,
            &self.append_rejected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
