//! Replay sensor backed by RAW stills on disk.
//!
//! Decodes camera RAW files (ARW, CR2, NEF, DNG, ...) with the rawloader library and serves
//! them in a loop as if they came off a live sensor. Useful for bench-testing the recorder
//! against real mosaics without the camera attached.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use rawloader::RawImageData as RawloaderImageData;
use tracing::{debug, warn};

use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::raw::driver::{CapturedFrame, ExposureSource, SensorDriver};
use crate::recording_pipeline::raw::types::{RawFrame, RawSamples};

/// Default bit depth when no white level information is available from the RAW file.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

const RAW_EXTENSIONS: [&str; 8] = ["arw", "cr2", "nef", "dng", "raf", "orf", "rw2", "pef"];

#[derive(Default)]
struct ReplayState {
    next: usize,
    /// Camera multipliers of the last decoded file, normalized so green is 1.0.
    last_wb: Option<(f64, f64)>,
}

pub struct RawFileSensor {
    files: Vec<PathBuf>,
    state: Mutex<ReplayState>,
    gain: AtomicI32,
    exposure_us: AtomicU32,
}

impl RawFileSensor {
    /// Collects every RAW file in `dir`, replayed in file-name order.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| RecorderError::DecodeError(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| RAW_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Self::from_files(files)
    }

    pub fn from_files(files: Vec<PathBuf>) -> Result<Self> {
        if files.is_empty() {
            return Err(RecorderError::DecodeError("no RAW files to replay".to_string()));
        }
        Ok(Self {
            files,
            state: Mutex::new(ReplayState::default()),
            gain: AtomicI32::new(0),
            exposure_us: AtomicU32::new(0),
        })
    }

    /// Exposure to report for every replayed frame; RAW stills carry none we trust.
    pub fn with_exposure_us(self, exposure_us: u32) -> Self {
        self.exposure_us.store(exposure_us, Ordering::Relaxed);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reads and decodes one RAW file into a frame plus its white balance multipliers.
    pub fn decode(data: &[u8]) -> Result<(RawFrame, Option<(f64, f64)>)> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| RecorderError::DecodeError(e.to_string()))?;

        let width = decoded.width;
        let height = decoded.height;
        if decoded.cpp != 1 {
            return Err(RecorderError::DecodeError(format!(
                "expected a single-channel mosaic, got {} components per pixel",
                decoded.cpp
            )));
        }

        let max_white_level = decoded.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
        let bits_per_sample = if max_white_level == 0 {
            DEFAULT_BITS_PER_SAMPLE
        } else {
            // e.g. 4095 (0xFFF) -> 12 bits, 16383 (0x3FFF) -> 14 bits
            U16_BITS - max_white_level.leading_zeros()
        };

        let [r, g, b, _] = decoded.wb_coeffs;
        let wb = (g.is_finite() && g > 0.0 && r > 0.0 && b > 0.0)
            .then(|| (f64::from(r / g), f64::from(b / g)));

        // Float data stays normalized; the recorder scales it when coercing to u16.
        let samples = match decoded.data {
            RawloaderImageData::Integer(values) => RawSamples::U16(values),
            RawloaderImageData::Float(values) => RawSamples::F32(values),
        };

        debug!(width, height, bits_per_sample, "Decoded RAW frame");
        Ok((RawFrame::new(width, height, samples).with_bit_depth(bits_per_sample), wb))
    }

    fn next_path(&self) -> Option<PathBuf> {
        let mut state = self.state.lock().ok()?;
        let path = self.files[state.next % self.files.len()].clone();
        state.next = state.next.wrapping_add(1);
        Some(path)
    }
}

impl ExposureSource for RawFileSensor {
    fn exposure_us(&self) -> Option<u32> {
        match self.exposure_us.load(Ordering::Relaxed) {
            0 => None,
            us => Some(us),
        }
    }
}

impl SensorDriver for RawFileSensor {
    fn grab_frame(&self) -> Option<CapturedFrame> {
        let path = self.next_path()?;
        let decoded = std::fs::read(&path)
            .map_err(|e| RecorderError::DecodeError(format!("{}: {}", path.display(), e)))
            .and_then(|bytes| Self::decode(&bytes));

        let (raw, wb) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(path = %path.display(), "Skipping unreadable RAW file: {}", e);
                return None;
            }
        };

        if let Ok(mut state) = self.state.lock() {
            state.last_wb = wb;
        }

        Some(CapturedFrame {
            preview: Vec::new(),
            preview_width: 0,
            preview_height: 0,
            raw: Some(raw),
        })
    }

    fn gain(&self) -> Option<i32> {
        Some(self.gain.load(Ordering::Relaxed))
    }

    fn set_gain(&self, delta: i32) {
        self.gain.fetch_add(delta, Ordering::Relaxed);
    }

    fn trigger_white_balance(&self) -> Option<(f64, f64)> {
        self.state.lock().ok().and_then(|state| state.last_wb)
    }
}
