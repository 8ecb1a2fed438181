//! Sensor calibration data

use tracing::warn;

use crate::recording_pipeline::common::error::{RecorderError, Result};

/// Color matrix (XYZ -> camera) measured under Standard Light A, row-major.
pub const STANDARD_A_MATRIX: [f64; 9] = [
    1.4296849, -0.7867698, 0.2219452,
    -0.2511404, 0.9766861, 0.2091821,
    -0.0839671, 0.1939601, 0.6574579,
];

/// Color matrix (XYZ -> camera) measured under D65, row-major.
pub const D65_MATRIX: [f64; 9] = [
    1.4868945, -0.6438222, -0.0699355,
    -0.261274, 1.0494869, 0.1399011,
    -0.1775877, 0.313115, 0.4792254,
];

/// 2x2 Bayer arrangement, named by the colors of the top-left quad read row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CfaPattern {
    #[default]
    Gbrg,
    Grbg,
    Rggb,
    Bggr,
}

impl CfaPattern {
    pub const ALL: [CfaPattern; 4] = [CfaPattern::Gbrg, CfaPattern::Grbg, CfaPattern::Rggb, CfaPattern::Bggr];

    /// DNG `CFAPattern` bytes, 0 = red, 1 = green, 2 = blue.
    pub fn as_bytes(self) -> [u8; 4] {
        match self {
            CfaPattern::Gbrg => [1, 2, 0, 1],
            CfaPattern::Grbg => [1, 0, 2, 1],
            CfaPattern::Rggb => [0, 1, 1, 2],
            CfaPattern::Bggr => [2, 1, 1, 0],
        }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_bytes() == bytes)
    }

    /// Parses a configured pattern.
    ///
    /// A tuple that is not four entries long is a configuration error. Four entries that
    /// name no known Bayer layout fall back to the default with a warning.
    pub fn from_config(values: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = values.try_into().map_err(|_| {
            RecorderError::Configuration(format!(
                "cfa pattern must have exactly 4 entries, got {}",
                values.len()
            ))
        })?;

        Ok(Self::from_bytes(bytes).unwrap_or_else(|| {
            let fallback = CfaPattern::default();
            warn!(?bytes, ?fallback, "Unrecognized CFA pattern, using default");
            fallback
        }))
    }
}

/// EXIF LightSource values used as DNG calibration illuminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Illuminant {
    StandardLightA,
    D65,
}

impl Illuminant {
    pub fn exif_code(self) -> u16 {
        match self {
            Illuminant::StandardLightA => 17,
            Illuminant::D65 => 21,
        }
    }
}

/// Fixed calibration of the sensor. Read-only once the recorder is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    pub make: String,
    pub model: String,
    pub software: String,
    pub color_matrix_1: [f64; 9],
    pub color_matrix_2: [f64; 9],
    pub illuminant_1: Illuminant,
    pub illuminant_2: Illuminant,
    pub cfa_pattern: CfaPattern,
    pub black_level: u32,
    pub white_level: u32,
    pub bits_per_sample: u32,
    pub baseline_exposure: f64,
    pub bayer_green_split: u32,
}

impl ColorProfile {
    /// Calibration of the F16 camera head with the given mosaic layout.
    pub fn f16(cfa_pattern: CfaPattern) -> Self {
        Self {
            make: "LA FAUX BOLEX".to_string(),
            model: "F16".to_string(),
            software: format!("faux_bolex_rs v{}", env!("CARGO_PKG_VERSION")),
            color_matrix_1: STANDARD_A_MATRIX,
            color_matrix_2: D65_MATRIX,
            illuminant_1: Illuminant::StandardLightA,
            illuminant_2: Illuminant::D65,
            cfa_pattern,
            black_level: 30,
            white_level: 65520,
            bits_per_sample: 12,
            baseline_exposure: 1.0,
            bayer_green_split: 240,
        }
    }
}

impl Default for ColorProfile {
    fn default() -> Self {
        Self::f16(CfaPattern::default())
    }
}
