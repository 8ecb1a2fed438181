use crate::recording_pipeline::raw::types::RawFrame;

/// Anything that can report the sensor's current exposure time.
///
/// The encode worker reads this once per session, when the first frame arrives.
pub trait ExposureSource: Send + Sync {
    fn exposure_us(&self) -> Option<u32>;
}

/// Exposure source for setups without a readable shutter; exposure tags are omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExposure;

impl ExposureSource for NoExposure {
    fn exposure_us(&self) -> Option<u32> {
        None
    }
}

/// One grab from the sensor: the display-ready preview plus the untouched raw mosaic.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Interleaved RGB8 preview, `preview_width * preview_height * 3` bytes.
    pub preview: Vec<u8>,
    pub preview_width: usize,
    pub preview_height: usize,
    pub raw: Option<RawFrame>,
}

/// Camera driver as seen by the capture loop.
///
/// Every query may fail; `None` means the value is unavailable right now.
pub trait SensorDriver: ExposureSource {
    fn grab_frame(&self) -> Option<CapturedFrame>;

    fn gain(&self) -> Option<i32>;

    fn set_gain(&self, delta: i32);

    /// Runs a one-shot white balance and returns the (red, blue) gains it settled on.
    fn trigger_white_balance(&self) -> Option<(f64, f64)>;
}
