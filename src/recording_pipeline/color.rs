//! Color calibration and white balance
//!
//! Static sensor calibration (matrices, illuminants, CFA layout) and the mutable
//! white balance gains fed by the camera's one-shot white balance trigger.

pub mod profile;
mod white_balance;

pub use profile::{CfaPattern, ColorProfile, Illuminant};
pub use white_balance::{WhiteBalanceGains, WhiteBalanceState};
