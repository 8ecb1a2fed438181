use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid recorder configuration: {0}")]
    Configuration(String),

    #[error("Storage root is unavailable: {path}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("Failed to create session directory {path}: {reason}")]
    SessionDirectory { path: PathBuf, reason: String },

    #[error("A recording session is already active")]
    AlreadyActive,

    #[error("Invalid white balance gains: {0}")]
    InvalidWhiteBalance(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame shape mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("Failed to coerce samples to u16: {0}")]
    SampleCoercion(String),

    #[error("Failed to encode DNG frame: {0}")]
    EncodeError(String),

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Failed to decode RAW image: {0}")]
    DecodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RecorderError {
    /// Errors that make the encode worker unusable for the rest of the session.
    ///
    /// Everything else raised while handling a single frame only costs that frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RecorderError::EncoderUnavailable(_)
                | RecorderError::Configuration(_)
                | RecorderError::StorageUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
