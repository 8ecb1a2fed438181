//! Deterministic test-pattern sensor.
//!
//! Produces a 12-bit Bayer ramp packed into the top of each u16, so output files look like
//! what the real sensor delivers (black level 30, white level 65520).

use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use tracing::debug;

use crate::recording_pipeline::raw::driver::{CapturedFrame, ExposureSource, SensorDriver};
use crate::recording_pipeline::raw::types::RawFrame;

const PREVIEW_SCALE: usize = 4;
const MIN_GAIN: i32 = 0;
const MAX_GAIN: i32 = 480;

#[derive(Debug, Clone)]
pub struct SyntheticSensorConfig {
    pub width: usize,
    pub height: usize,
    /// Exposure reported to the recorder; 0 reads as "unavailable".
    pub exposure_us: u32,
    pub initial_gain: i32,
    /// Gains the one-shot white balance reports, (red, blue).
    pub white_balance: (f64, f64),
}

impl Default for SyntheticSensorConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            exposure_us: 20_833,
            initial_gain: 100,
            white_balance: (1.82, 1.47),
        }
    }
}

pub struct SyntheticSensor {
    config: SyntheticSensorConfig,
    frame_index: AtomicU64,
    gain: AtomicI32,
    exposure_us: AtomicU32,
    /// Shape override for the next grab only; used to exercise shape validation.
    next_shape: Mutex<Option<(usize, usize)>>,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticSensorConfig) -> Self {
        Self {
            frame_index: AtomicU64::new(0),
            gain: AtomicI32::new(config.initial_gain),
            exposure_us: AtomicU32::new(config.exposure_us),
            next_shape: Mutex::new(None),
            config,
        }
    }

    pub fn set_exposure_us(&self, exposure_us: u32) {
        self.exposure_us.store(exposure_us, Ordering::Relaxed);
    }

    /// Makes the next grabbed raw frame `width`x`height` instead of the configured size.
    pub fn glitch_next_frame(&self, width: usize, height: usize) {
        if let Ok(mut next) = self.next_shape.lock() {
            *next = Some((width, height));
        }
    }

    pub fn frames_grabbed(&self) -> u64 {
        self.frame_index.load(Ordering::Relaxed)
    }

    fn render_raw(&self, width: usize, height: usize, index: u64) -> RawFrame {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let ramp = ((x + y) as u64 * 4095 / (width + height).max(1) as u64 + index) % 4096;
                // Keep the green photosites brighter, like an uncorrected sensor.
                let green = (x + y) % 2 == 1;
                let value = if green { ramp.max(512) } else { ramp / 2 };
                samples.push(((value as u16).min(4095) << 4).max(30));
            }
        }
        RawFrame::from_u16(width, height, samples)
    }

    fn render_preview(&self, raw: &RawFrame) -> (Vec<u8>, usize, usize) {
        let width = (raw.width() / PREVIEW_SCALE).max(1);
        let height = (raw.height() / PREVIEW_SCALE).max(1);
        let level = (self.gain.load(Ordering::Relaxed).clamp(MIN_GAIN, MAX_GAIN) / 2) as u8;
        (vec![level; width * height * 3], width, height)
    }
}

impl ExposureSource for SyntheticSensor {
    fn exposure_us(&self) -> Option<u32> {
        match self.exposure_us.load(Ordering::Relaxed) {
            0 => None,
            us => Some(us),
        }
    }
}

impl SensorDriver for SyntheticSensor {
    fn grab_frame(&self) -> Option<CapturedFrame> {
        let index = self.frame_index.fetch_add(1, Ordering::Relaxed);
        let (width, height) = self
            .next_shape
            .lock()
            .ok()
            .and_then(|mut next| next.take())
            .unwrap_or((self.config.width, self.config.height));

        let raw = self.render_raw(width, height, index);
        let (preview, preview_width, preview_height) = self.render_preview(&raw);
        debug!(index, width, height, "Synthetic frame grabbed");

        Some(CapturedFrame {
            preview,
            preview_width,
            preview_height,
            raw: Some(raw),
        })
    }

    fn gain(&self) -> Option<i32> {
        Some(self.gain.load(Ordering::Relaxed))
    }

    fn set_gain(&self, delta: i32) {
        let updated = self
            .gain
            .load(Ordering::Relaxed)
            .saturating_add(delta)
            .clamp(MIN_GAIN, MAX_GAIN);
        self.gain.store(updated, Ordering::Relaxed);
    }

    fn trigger_white_balance(&self) -> Option<(f64, f64)> {
        Some(self.config.white_balance)
    }
}
