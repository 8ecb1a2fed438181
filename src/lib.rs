pub mod logger;
pub mod recording_pipeline;
