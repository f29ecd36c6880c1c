use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Loop health over the last completed interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_ms: f32,
    /// Frames whose simulation backlog hit the tick cap.
    pub clamped_frames: u32,
}

/// Shared read side of the loop metrics. Cloned handles see the same values.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<Mutex<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

#[derive(Debug, Default)]
struct IntervalCounts {
    frames: u32,
    ticks: u32,
    frame_time: Duration,
    worst_frame: Duration,
    clamped_frames: u32,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    started_at: Instant,
    counts: IntervalCounts,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            started_at: Instant::now(),
            counts: IntervalCounts::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        let counts = &mut self.counts;
        counts.frames = counts.frames.saturating_add(1);
        counts.frame_time = counts.frame_time.saturating_add(frame_dt);
        counts.worst_frame = counts.worst_frame.max(frame_dt);
    }

    pub(crate) fn record_tick(&mut self) {
        self.counts.ticks = self.counts.ticks.saturating_add(1);
    }

    pub(crate) fn record_clamped_frame(&mut self) {
        self.counts.clamped_frames = self.counts.clamped_frames.saturating_add(1);
    }

    /// Closes the interval once it has run its full length and starts the
    /// next one at `now`.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed < self.interval {
            return None;
        }

        let counts = std::mem::take(&mut self.counts);
        self.started_at = now;

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counts.frames {
            0 => 0.0,
            frames => counts.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counts.frames as f32 / seconds,
            tps: counts.ticks as f32 / seconds,
            frame_time_ms,
            worst_frame_ms: counts.worst_frame.as_secs_f32() * 1000.0,
            clamped_frames: counts.clamped_frames,
        })
    }
}
