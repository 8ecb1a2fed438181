//! DNG encoder configuration types

/// Strip encoding applied to the raw image.
///
/// Only `None` produces a file that DNG readers decode. `Deflate` writes TIFF
/// compression 8, which DNG allows for floating point data only; raw decoders
/// reject it for integer CFA strips. It is kept as an archival mode for tools
/// that read plain TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DngCompression {
    /// Uncompressed strips (default, readable by any DNG decoder)
    None,
    /// Deflate strips (smaller files, not a valid DNG)
    Deflate,
}

impl DngCompression {
    pub fn is_compressed(self) -> bool {
        !matches!(self, DngCompression::None)
    }

    /// Whether raw decoders accept files written with this mode.
    pub fn is_dng_readable(self) -> bool {
        matches!(self, DngCompression::None)
    }
}

/// Configuration for the DNG writer
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Compression method to use
    pub compression: DngCompression,
    /// Predictor value for Deflate (2 for horizontal differencing)
    /// Note: ignored when compression is `None`
    pub predictor: Option<u16>,
    /// Rows per strip; `None` writes the whole frame as one strip
    pub rows_per_strip: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            compression: DngCompression::None,
            predictor: Some(2),
            rows_per_strip: None,
        }
    }
}

impl EncoderConfig {
    pub fn builder() -> EncoderConfigBuilder {
        EncoderConfigBuilder::default()
    }
}

/// Builder for EncoderConfig
#[derive(Default)]
pub struct EncoderConfigBuilder {
    compression: Option<DngCompression>,
    predictor: Option<Option<u16>>,
    rows_per_strip: Option<Option<u32>>,
}

impl EncoderConfigBuilder {
    pub fn compression(mut self, compression: DngCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn rows_per_strip(mut self, rows: Option<u32>) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn build(self) -> EncoderConfig {
        let default = EncoderConfig::default();
        EncoderConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            rows_per_strip: self.rows_per_strip.unwrap_or(default.rows_per_strip),
        }
    }
}
