//! Per-session DNG metadata
//!
//! Everything a raw developer needs to interpret the mosaic: geometry, CFA layout, levels,
//! calibration matrices and illuminants, exposure, and the as-shot neutral point. Built once
//! per session from the first frame's geometry and never changed afterwards.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::recording_pipeline::color::{CfaPattern, ColorProfile, Illuminant, WhiteBalanceGains};

/// Denominator for color matrix entries.
pub const MATRIX_DENOMINATOR: i32 = 1_000_000;
/// Denominator for the as-shot neutral point.
pub const NEUTRAL_DENOMINATOR: u32 = 10_000;
/// Denominator for the baseline exposure.
pub const BASELINE_EXPOSURE_DENOMINATOR: i32 = 100;
/// Exposure time is recorded in microseconds.
pub const EXPOSURE_DENOMINATOR: u32 = 1_000_000;

pub const DNG_VERSION: [u8; 4] = [1, 4, 0, 0];
pub const DNG_BACKWARD_VERSION: [u8; 4] = [1, 2, 0, 0];
pub const ORIENTATION_HORIZONTAL: u16 = 1;
pub const CFA_REPEAT_PATTERN_DIM: [u16; 2] = [2, 2];
pub const CFA_PLANE_COLOR: [u8; 3] = [0, 1, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn from_f64(value: f64, den: u32) -> Self {
        Self {
            num: (value * den as f64).round().clamp(0.0, u32::MAX as f64) as u32,
            den,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SRational {
    pub num: i32,
    pub den: i32,
}

impl SRational {
    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn from_f64(value: f64, den: i32) -> Self {
        Self {
            num: (value * den as f64)
                .round()
                .clamp(i32::MIN as f64, i32::MAX as f64) as i32,
            den,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

/// How the as-shot neutral point is derived from the white balance gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeutralPointPolicy {
    /// Always 1:1:1. The driver applies white balance before readout, so the mosaic is
    /// already balanced and the developer must not correct it again.
    #[default]
    Forced,
    /// Record the reciprocal of the gains, normalized to green, for drivers that leave
    /// the mosaic unbalanced.
    TrackGains,
}

impl NeutralPointPolicy {
    pub fn neutral_point(self, gains: &WhiteBalanceGains) -> [Rational; 3] {
        match self {
            NeutralPointPolicy::Forced => [Rational::new(NEUTRAL_DENOMINATOR, NEUTRAL_DENOMINATOR); 3],
            NeutralPointPolicy::TrackGains => gains
                .as_array()
                .map(|gain| Rational::from_f64(gains.green / gain, NEUTRAL_DENOMINATOR)),
        }
    }
}

/// The finalized tag set for one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetadata {
    pub make: String,
    pub model: String,
    pub software: String,
    pub unique_camera_model: String,
    pub dng_version: [u8; 4],
    pub dng_backward_version: [u8; 4],
    pub orientation: u16,

    pub width: u32,
    pub height: u32,
    pub default_crop_origin: [u32; 2],
    pub default_crop_size: [u32; 2],
    /// Sensor depth; samples are still stored in 16-bit containers.
    pub bits_per_sample: u32,

    pub cfa_pattern: CfaPattern,
    pub cfa_repeat_pattern_dim: [u16; 2],
    pub cfa_plane_color: [u8; 3],
    pub black_level: u32,
    pub white_level: u32,
    pub bayer_green_split: u32,

    pub color_matrix_1: [SRational; 9],
    pub color_matrix_2: [SRational; 9],
    pub calibration_illuminant_1: Illuminant,
    pub calibration_illuminant_2: Illuminant,
    pub baseline_exposure: SRational,
    pub as_shot_neutral: [Rational; 3],

    /// Omitted when the driver had no positive exposure reading.
    pub exposure_time: Option<Rational>,
}

impl SessionMetadata {
    pub fn exposure_seconds(&self) -> Option<f64> {
        self.exposure_time.map(Rational::to_f64)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBuilder {
    policy: NeutralPointPolicy,
}

impl MetadataBuilder {
    pub fn new(policy: NeutralPointPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NeutralPointPolicy {
        self.policy
    }

    pub fn build(
        &self,
        profile: &ColorProfile,
        gains: &WhiteBalanceGains,
        frame_width: u32,
        frame_height: u32,
        exposure_us: Option<u32>,
    ) -> SessionMetadata {
        SessionMetadata {
            make: profile.make.clone(),
            model: profile.model.clone(),
            software: profile.software.clone(),
            unique_camera_model: profile.make.clone(),
            dng_version: DNG_VERSION,
            dng_backward_version: DNG_BACKWARD_VERSION,
            orientation: ORIENTATION_HORIZONTAL,

            width: frame_width,
            height: frame_height,
            default_crop_origin: [0, 0],
            default_crop_size: [frame_width, frame_height],
            bits_per_sample: profile.bits_per_sample,

            cfa_pattern: profile.cfa_pattern,
            cfa_repeat_pattern_dim: CFA_REPEAT_PATTERN_DIM,
            cfa_plane_color: CFA_PLANE_COLOR,
            black_level: profile.black_level,
            white_level: profile.white_level,
            bayer_green_split: profile.bayer_green_split,

            color_matrix_1: matrix_to_rationals(&profile.color_matrix_1),
            color_matrix_2: matrix_to_rationals(&profile.color_matrix_2),
            calibration_illuminant_1: profile.illuminant_1,
            calibration_illuminant_2: profile.illuminant_2,
            baseline_exposure: SRational::from_f64(
                profile.baseline_exposure,
                BASELINE_EXPOSURE_DENOMINATOR,
            ),
            as_shot_neutral: self.policy.neutral_point(gains),

            exposure_time: exposure_us
                .filter(|&us| us > 0)
                .map(|us| Rational::new(us, EXPOSURE_DENOMINATOR)),
        }
    }
}

fn matrix_to_rationals(matrix: &[f64; 9]) -> [SRational; 9] {
    matrix.map(|v| SRational::from_f64(v, MATRIX_DENOMINATOR))
}

/// The encoder configuration of the session currently streaming.
///
/// Published by the encode worker once it has configured the encoder; the white balance
/// trigger may re-stamp its neutral point, which bumps the generation so the worker
/// re-applies it before the next frame.
#[derive(Debug, Default)]
pub struct LiveMetadata {
    current: Mutex<Option<SessionMetadata>>,
    generation: AtomicU64,
}

impl LiveMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, metadata: SessionMetadata) -> u64 {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(metadata);
        }
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Re-stamps the forced neutral point. Returns false if nothing has been published yet.
    pub fn refresh_neutral(&self) -> bool {
        let Ok(mut current) = self.current.lock() else {
            return false;
        };
        let Some(metadata) = current.as_mut() else {
            return false;
        };
        metadata.as_shot_neutral = NeutralPointPolicy::Forced.neutral_point(&WhiteBalanceGains::NEUTRAL);
        self.generation.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Option<SessionMetadata> {
        self.current.lock().ok().and_then(|current| current.clone())
    }
}
