//! RAW frame types

use crate::recording_pipeline::common::error::{RecorderError, Result};

/// Nominal sensor depth; samples are packed into the top of a u16.
pub const DEFAULT_BIT_DEPTH: u32 = 12;

/// Sample storage as delivered by a driver.
///
/// The encoder only ever sees `u16`; everything else is coerced on the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    /// Normalized 0.0-1.0 samples, scaled to the full u16 range.
    F32(Vec<f32>),
}

impl RawSamples {
    pub fn len(&self) -> usize {
        match self {
            RawSamples::U8(v) => v.len(),
            RawSamples::U16(v) => v.len(),
            RawSamples::U32(v) => v.len(),
            RawSamples::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RawSamples::U8(_) => "u8",
            RawSamples::U16(_) => "u16",
            RawSamples::U32(_) => "u32",
            RawSamples::F32(_) => "f32",
        }
    }

    /// Converts to the recorder's fixed u16 representation.
    ///
    /// Integer samples wider than 16 bits saturate. Float samples must be finite.
    pub fn into_u16(self) -> Result<Vec<u16>> {
        match self {
            RawSamples::U16(values) => Ok(values),
            RawSamples::U8(values) => Ok(values.into_iter().map(u16::from).collect()),
            RawSamples::U32(values) => Ok(values
                .into_iter()
                .map(|v| v.min(u16::MAX as u32) as u16)
                .collect()),
            RawSamples::F32(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    if !v.is_finite() {
                        return Err(RecorderError::SampleCoercion(format!(
                            "non-finite sample {v} at index {i}"
                        )));
                    }
                    Ok((v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub width: usize,
    pub height: usize,
}

/// One raw sensor readout: a single-channel Bayer mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    width: usize,
    height: usize,
    bit_depth: u32,
    samples: RawSamples,
}

impl RawFrame {
    pub fn new(width: usize, height: usize, samples: RawSamples) -> Self {
        Self {
            width,
            height,
            bit_depth: DEFAULT_BIT_DEPTH,
            samples,
        }
    }

    pub fn from_u16(width: usize, height: usize, samples: Vec<u16>) -> Self {
        Self::new(width, height, RawSamples::U16(samples))
    }

    pub fn with_bit_depth(mut self, bit_depth: u32) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
        }
    }

    pub fn samples(&self) -> &RawSamples {
        &self.samples
    }

    /// A frame with no photosites or no samples is never recorded.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.samples.is_empty()
    }

    /// Consumes the frame, yielding validated u16 samples in row-major order.
    pub fn into_u16_samples(self) -> Result<Vec<u16>> {
        let expected = self.width * self.height;
        if self.samples.len() != expected {
            return Err(RecorderError::SampleCoercion(format!(
                "{} {} samples for a {}x{} frame (expected {})",
                self.samples.len(),
                self.samples.type_name(),
                self.width,
                self.height,
                expected
            )));
        }
        self.samples.into_u16()
    }
}
