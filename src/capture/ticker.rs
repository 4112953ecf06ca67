//! Capture ticker
//!
//! Periodic trigger standing in for the display refresh signal. It fires at
//! the lesser of the display rate and the target frame rate, and the tick
//! handler must return immediately.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic capture trigger bound to one recording
pub struct CaptureTicker {
    rate: u32,
    handle: JoinHandle<()>,
}

impl CaptureTicker {
    /// Effective tick rate for a display refresh rate and a target fps
    pub fn effective_rate(display_refresh_hz: Option<u32>, target_fps: u32) -> u32 {
        match display_refresh_hz {
            Some(hz) if hz > 0 => hz.min(target_fps).max(1),
            _ => target_fps.max(1),
        }
    }

    /// Start ticking. Must be called from within a tokio runtime.
    pub fn start<F>(display_refresh_hz: Option<u32>, target_fps: u32, on_tick: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let rate = Self::effective_rate(display_refresh_hz, target_fps);
        let period = Duration::from_secs_f64(1.0 / rate as f64);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                on_tick();
            }
        });

        tracing::debug!("Capture ticker started at {} Hz", rate);
        Self { rate, handle }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Stop immediately; no further ticks are delivered
    pub fn stop(self) {
        self.handle.abort();
        tracing::debug!("Capture ticker stopped");
    }
}

impl Drop for CaptureTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_effective_rate() {
        assert_eq!(CaptureTicker::effective_rate(Some(60), 30), 30);
        assert_eq!(CaptureTicker::effective_rate(Some(24), 30), 24);
        assert_eq!(CaptureTicker::effective_rate(None, 30), 30);
        assert_eq!(CaptureTicker::effective_rate(Some(0), 30), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_target_rate() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = CaptureTicker::start(Some(60), 30, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ticker.rate(), 30);

        tokio::time::sleep(Duration::from_millis(1010)).await;
        let count = ticks.load(Ordering::SeqCst);
        assert!((29..=32).contains(&count), "got {} ticks", count);

        ticker.stop();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let after = ticks.load(Ordering::SeqCst);
        assert!(after <= count + 1, "ticked after stop: {} -> {}", count, after);
    }
}
