//! Capture loop glue
//!
//! Pumps frames from a sensor driver into the recorder and produces the numbers a preview
//! overlay shows. Rendering itself lives elsewhere.

mod capture_loop;
mod fps;


pub use capture_loop::{CaptureLoop, CaptureStatus, ControlCommand, GAIN_STEP};
pub use fps::{FpsMeter, TARGET_FPS_FOR_ANGLE, shutter_angle};
