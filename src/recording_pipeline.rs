//! Raw recording pipeline
//!
//! Takes raw sensor frames from a capture loop and writes them, one DNG per frame, on a
//! background worker so the preview never waits on the disk.

pub mod capture;
pub mod color;
pub mod common;
pub mod dng;
pub mod raw;
pub mod session;

pub use common::{RecorderError, Result};

pub use raw::{CapturedFrame, ExposureSource, RawFileSensor, RawFrame, RawSamples, SensorDriver, SyntheticSensor};

pub use color::{CfaPattern, ColorProfile, WhiteBalanceGains, WhiteBalanceState};

pub use dng::{DngCompression, DngWriter, EncoderConfig, FrameEncoder, MetadataBuilder, SessionMetadata};

pub use session::{AddFrameOutcome, Recorder, RecorderConfig, SessionStatus, StopOutcome};

pub use capture::{CaptureLoop, CaptureStatus, ControlCommand};
