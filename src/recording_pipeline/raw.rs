//! Sensor-side types and drivers
//!
//! Frames as they come off the sensor, the driver interface the capture loop talks to,
//! and the two drivers shipped with the crate.

mod driver;
mod rawloader_sensor;
mod synthetic_sensor;
pub mod types;


pub use driver::{CapturedFrame, ExposureSource, NoExposure, SensorDriver};
pub use rawloader_sensor::RawFileSensor;
pub use synthetic_sensor::{SyntheticSensor, SyntheticSensorConfig};
pub use types::{FrameShape, RawFrame, RawSamples};
