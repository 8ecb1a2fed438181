//! Common utilities module
//!
//! Shared error type and timing helpers used across the recording pipeline.

pub mod error;
pub mod timing;


pub use error::{RecorderError, Result};
pub use timing::{EncodeTimings, Timer};
