//! DNG writing module
//!
//! Session metadata construction and the lossless DNG container writer.

pub mod metadata;
mod dng_writer;
mod writer;
pub mod types;


pub use dng_writer::DngWriter;
pub use metadata::{LiveMetadata, MetadataBuilder, NeutralPointPolicy, Rational, SRational, SessionMetadata};
pub use types::{DngCompression, EncoderConfig, EncoderConfigBuilder};
pub use writer::FrameEncoder;
