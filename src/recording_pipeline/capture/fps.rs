use std::time::{Duration, Instant};

/// Frame rate the shutter angle is expressed against.
pub const TARGET_FPS_FOR_ANGLE: f64 = 24.0;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Shutter angle in degrees for an exposure, or `None` when the exposure is unknown.
pub fn shutter_angle(exposure_us: u32) -> Option<f64> {
    if exposure_us == 0 {
        return None;
    }
    Some(exposure_us as f64 / 1_000_000.0 * TARGET_FPS_FOR_ANGLE * 360.0)
}

/// Preview frame rate, recomputed once per second of frames.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Counts one frame at `now` and returns the current estimate.
    pub fn record_frame(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.frames as f64 / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}
