use std::path::{Path, PathBuf};

use crate::recording_pipeline::common::error::Result;
use crate::recording_pipeline::dng::metadata::SessionMetadata;

/// Writes one frame per call into a self-describing lossless raw container.
///
/// `configure` is called once before the first `encode` of a session (and again, with
/// identical geometry, if the live configuration is refreshed). `encode` is called with
/// strictly increasing paths and must not touch previously written files.
pub trait FrameEncoder: Send {
    fn configure(&mut self, metadata: &SessionMetadata) -> Result<()>;

    /// Encodes `samples` to `path_without_extension` plus [`FrameEncoder::extension`],
    /// returning the path written.
    fn encode(&mut self, samples: &[u16], path_without_extension: &Path) -> Result<PathBuf>;

    /// Called once after the last frame of a session.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn extension(&self) -> &'static str;
}
