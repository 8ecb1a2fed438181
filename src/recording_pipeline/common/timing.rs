use std::time::{Duration, Instant};

/// Running summary of per-frame encode durations for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncodeTimings {
    frames: u64,
    total: Duration,
    slowest: Duration,
}

impl EncodeTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, duration: Duration) {
        self.frames += 1;
        self.total += duration;
        self.slowest = self.slowest.max(duration);
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn slowest(&self) -> Duration {
        self.slowest
    }

    pub fn mean(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.frames as f64)
    }

    /// Highest sustained frame rate the encoder managed, or `None` before any frame.
    pub fn sustained_fps(&self) -> Option<f64> {
        let mean = self.mean().as_secs_f64();
        (mean > 0.0).then(|| 1.0 / mean)
    }
}

#[cfg(test)]
impl EncodeTimings {
    pub(crate) fn from_parts(frames: u64, total: Duration, slowest: Duration) -> Self {
        Self {
            frames,
            total,
            slowest,
        }
    }
}

pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn stop(self) -> (&'static str, Duration) {
        (self.name, self.start.elapsed())
    }
}
