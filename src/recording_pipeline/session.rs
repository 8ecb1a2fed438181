//! Recording session lifecycle
//!
//! The frame queue between the capture loop and the encoder, the single background encode
//! worker, and the recorder that starts, caps and stops sessions.

mod controller;
mod encode_worker;
mod frame_buffer;
pub mod types;

#[cfg(test)]
mod tests;

pub use controller::Recorder;
pub use encode_worker::{EncodeWorker, WorkerState};
pub use frame_buffer::{FrameBuffer, FrameConsumer, QueueItem, QueuedFrame};
pub use types::{
    AddFrameOutcome, Clock, RecorderConfig, RecorderConfigBuilder, SessionInfo, SessionProgress,
    SessionStatus, StopOutcome, SystemClock, WorkerExit, WorkerReport,
};
