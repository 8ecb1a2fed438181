use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tiff::encoder::colortype::Gray16;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, Rational as TiffRational, SRational as TiffSRational, TiffEncoder};
use tiff::tags::{Predictor, Tag};
use tracing::{debug, instrument, warn};

use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::dng::metadata::{Rational, SRational, SessionMetadata};
use crate::recording_pipeline::dng::types::{DngCompression, EncoderConfig};
use crate::recording_pipeline::dng::writer::FrameEncoder;

/// TIFF/EP and DNG tag numbers, written through `Tag::Unknown`.
pub(crate) mod dng_tag {
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    pub const ORIENTATION: u16 = 274;
    pub const EXPOSURE_TIME: u16 = 33434;
    pub const CFA_REPEAT_PATTERN_DIM: u16 = 33421;
    pub const CFA_PATTERN: u16 = 33422;
    pub const DNG_VERSION: u16 = 50706;
    pub const DNG_BACKWARD_VERSION: u16 = 50707;
    pub const UNIQUE_CAMERA_MODEL: u16 = 50708;
    pub const CFA_PLANE_COLOR: u16 = 50710;
    pub const CFA_LAYOUT: u16 = 50711;
    pub const BLACK_LEVEL: u16 = 50714;
    pub const WHITE_LEVEL: u16 = 50717;
    pub const DEFAULT_CROP_ORIGIN: u16 = 50719;
    pub const DEFAULT_CROP_SIZE: u16 = 50720;
    pub const COLOR_MATRIX_1: u16 = 50721;
    pub const COLOR_MATRIX_2: u16 = 50722;
    pub const AS_SHOT_NEUTRAL: u16 = 50728;
    pub const BASELINE_EXPOSURE: u16 = 50730;
    pub const BAYER_GREEN_SPLIT: u16 = 50733;
    pub const CALIBRATION_ILLUMINANT_1: u16 = 50778;
    pub const CALIBRATION_ILLUMINANT_2: u16 = 50779;
}

const PHOTOMETRIC_CFA: u16 = 32803;
const CFA_LAYOUT_RECTANGULAR: u16 = 1;

/// Lossless DNG writer built on the `tiff` encoder.
///
/// The mosaic is stored as a single-sample 16-bit image whose photometric interpretation is
/// switched to CFA, with every session tag written into IFD0.
#[derive(Debug, Clone, Default)]
pub struct DngWriter {
    config: EncoderConfig,
    metadata: Option<SessionMetadata>,
}

impl DngWriter {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            metadata: None,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn tiff_compression(&self) -> Compression {
        match self.config.compression {
            DngCompression::None => Compression::Uncompressed,
            DngCompression::Deflate => Compression::Deflate(DeflateLevel::Fast),
        }
    }

    /// Predictors only make sense in front of a compressor.
    fn tiff_predictor(&self) -> Option<Predictor> {
        if !self.config.compression.is_compressed() {
            return None;
        }
        self.config.predictor.map(|value| match value {
            2 => Predictor::Horizontal,
            _ => Predictor::None,
        })
    }

    /// Writes one complete DNG for `samples` to `output`.
    pub fn write_dng(
        &self,
        samples: &[u16],
        metadata: &SessionMetadata,
        output: &mut dyn Write,
    ) -> Result<()> {
        let expected = metadata.width as usize * metadata.height as usize;
        if samples.len() != expected {
            return Err(RecorderError::EncodeError(format!(
                "{} samples for a {}x{} session",
                samples.len(),
                metadata.width,
                metadata.height
            )));
        }

        debug!("Encoding DNG frame: {}x{}", metadata.width, metadata.height);

        let mut buffer = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
                .map_err(|e| RecorderError::EncodeError(e.to_string()))?
                .with_compression(self.tiff_compression());

            if let Some(predictor) = self.tiff_predictor() {
                encoder = encoder.with_predictor(predictor);
            }

            let mut image = encoder
                .new_image::<Gray16>(metadata.width, metadata.height)
                .map_err(|e| RecorderError::EncodeError(e.to_string()))?;

            if let Some(rows) = self.config.rows_per_strip {
                image
                    .rows_per_strip(rows.clamp(1, metadata.height.max(1)))
                    .map_err(|e| RecorderError::EncodeError(e.to_string()))?;
            }

            (|| -> tiff::TiffResult<()> {
                let dir = image.encoder();
                let m = metadata;

                dir.write_tag(Tag::Unknown(dng_tag::NEW_SUBFILE_TYPE), 0u32)?;
                // Replaces the BlackIsZero entry the Gray16 color type wrote.
                dir.write_tag(Tag::PhotometricInterpretation, PHOTOMETRIC_CFA)?;
                dir.write_tag(Tag::Make, m.make.as_str())?;
                dir.write_tag(Tag::Model, m.model.as_str())?;
                dir.write_tag(Tag::Software, m.software.as_str())?;
                dir.write_tag(Tag::Unknown(dng_tag::ORIENTATION), m.orientation)?;

                dir.write_tag(Tag::Unknown(dng_tag::DNG_VERSION), &m.dng_version[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::DNG_BACKWARD_VERSION), &m.dng_backward_version[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::UNIQUE_CAMERA_MODEL), m.unique_camera_model.as_str())?;

                let cfa_pattern = m.cfa_pattern.as_bytes();
                dir.write_tag(Tag::Unknown(dng_tag::CFA_REPEAT_PATTERN_DIM), &m.cfa_repeat_pattern_dim[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::CFA_PATTERN), &cfa_pattern[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::CFA_PLANE_COLOR), &m.cfa_plane_color[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::CFA_LAYOUT), CFA_LAYOUT_RECTANGULAR)?;

                dir.write_tag(Tag::Unknown(dng_tag::BLACK_LEVEL), m.black_level)?;
                dir.write_tag(Tag::Unknown(dng_tag::WHITE_LEVEL), m.white_level)?;
                dir.write_tag(Tag::Unknown(dng_tag::BAYER_GREEN_SPLIT), m.bayer_green_split)?;
                dir.write_tag(Tag::Unknown(dng_tag::DEFAULT_CROP_ORIGIN), &m.default_crop_origin[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::DEFAULT_CROP_SIZE), &m.default_crop_size[..])?;

                let matrix_1: Vec<TiffSRational> = m.color_matrix_1.iter().copied().map(to_tiff_srational).collect();
                let matrix_2: Vec<TiffSRational> = m.color_matrix_2.iter().copied().map(to_tiff_srational).collect();
                dir.write_tag(Tag::Unknown(dng_tag::COLOR_MATRIX_1), &matrix_1[..])?;
                dir.write_tag(Tag::Unknown(dng_tag::COLOR_MATRIX_2), &matrix_2[..])?;
                dir.write_tag(
                    Tag::Unknown(dng_tag::CALIBRATION_ILLUMINANT_1),
                    m.calibration_illuminant_1.exif_code(),
                )?;
                dir.write_tag(
                    Tag::Unknown(dng_tag::CALIBRATION_ILLUMINANT_2),
                    m.calibration_illuminant_2.exif_code(),
                )?;
                dir.write_tag(
                    Tag::Unknown(dng_tag::BASELINE_EXPOSURE),
                    to_tiff_srational(m.baseline_exposure),
                )?;

                let neutral: Vec<TiffRational> = m.as_shot_neutral.iter().copied().map(to_tiff_rational).collect();
                dir.write_tag(Tag::Unknown(dng_tag::AS_SHOT_NEUTRAL), &neutral[..])?;

                if let Some(exposure) = m.exposure_time {
                    dir.write_tag(Tag::Unknown(dng_tag::EXPOSURE_TIME), to_tiff_rational(exposure))?;
                }
                Ok(())
            })()
            .map_err(|e| RecorderError::EncodeError(e.to_string()))?;

            image
                .write_data(samples)
                .map_err(|e| RecorderError::EncodeError(e.to_string()))?;
        }

        output.write_all(&buffer)?;

        debug!(bytes = buffer.len(), "DNG encoding complete");
        Ok(())
    }
}

impl FrameEncoder for DngWriter {
    fn configure(&mut self, metadata: &SessionMetadata) -> Result<()> {
        if metadata.width == 0 || metadata.height == 0 {
            return Err(RecorderError::Configuration(format!(
                "invalid session geometry {}x{}",
                metadata.width, metadata.height
            )));
        }
        debug!(
            width = metadata.width,
            height = metadata.height,
            compression = ?self.config.compression,
            "DNG writer configured"
        );
        if !self.config.compression.is_dng_readable() {
            warn!(
                compression = ?self.config.compression,
                "Compressed strips are not readable by DNG decoders"
            );
        }
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    #[instrument(skip(self, samples), fields(path = %path_without_extension.display()))]
    fn encode(&mut self, samples: &[u16], path_without_extension: &Path) -> Result<PathBuf> {
        let metadata = self.metadata.as_ref().ok_or_else(|| {
            RecorderError::EncoderUnavailable("encode called before configure".to_string())
        })?;

        let mut buffer = Vec::new();
        self.write_dng(samples, metadata, &mut buffer)?;

        let path = path_without_extension.with_extension(self.extension());
        std::fs::write(&path, &buffer).map_err(|e| match e.kind() {
            // The session directory itself is gone; no later frame can succeed either.
            ErrorKind::NotFound => RecorderError::StorageUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            },
            _ => RecorderError::IoError(e),
        })?;

        Ok(path)
    }

    fn finish(&mut self) -> Result<()> {
        self.metadata = None;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "dng"
    }
}

fn to_tiff_rational(r: Rational) -> TiffRational {
    TiffRational { n: r.num, d: r.den }
}

fn to_tiff_srational(r: SRational) -> TiffSRational {
    TiffSRational { n: r.num, d: r.den }
}
