use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::recording_pipeline::color::{ColorProfile, WhiteBalanceState};
use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::common::timing::Timer;
use crate::recording_pipeline::dng::{FrameEncoder, LiveMetadata, MetadataBuilder};
use crate::recording_pipeline::raw::{ExposureSource, FrameShape};
use crate::recording_pipeline::session::frame_buffer::{FrameConsumer, QueueItem, QueuedFrame};
use crate::recording_pipeline::session::types::{SessionProgress, WorkerExit, WorkerReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingFirstFrame,
    Streaming,
    Draining,
    Stopped,
}

/// Everything a worker shares with the recorder that spawned it.
pub(crate) struct WorkerContext {
    pub profile: Arc<ColorProfile>,
    pub white_balance: Arc<WhiteBalanceState>,
    pub exposure: Arc<dyn ExposureSource>,
    pub metadata_builder: MetadataBuilder,
    pub live: Arc<LiveMetadata>,
    pub progress: Arc<SessionProgress>,
}

/// Drains one session's queue into the encoder, strictly in arrival order.
///
/// One worker per session; it is never reused once [`WorkerState::Stopped`].
pub struct EncodeWorker<E: FrameEncoder> {
    session_id: String,
    output_directory: PathBuf,
    consumer: FrameConsumer,
    encoder: E,
    context: WorkerContext,
    state: WorkerState,
    shape: Option<FrameShape>,
    frame_counter: usize,
    seen_generation: u64,
    report: WorkerReport,
}

/// Clears the running flag even if the encoder panics.
struct RunningGuard<'a>(&'a SessionProgress);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set_worker_running(false);
    }
}

impl<E: FrameEncoder> EncodeWorker<E> {
    pub(crate) fn new(
        session_id: String,
        output_directory: PathBuf,
        consumer: FrameConsumer,
        encoder: E,
        context: WorkerContext,
    ) -> Self {
        let report = WorkerReport::new(session_id.clone());
        Self {
            session_id,
            output_directory,
            consumer,
            encoder,
            context,
            state: WorkerState::AwaitingFirstFrame,
            shape: None,
            frame_counter: 0,
            seen_generation: 0,
            report,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[instrument(name = "encode_worker", skip(self), fields(session = %self.session_id))]
    pub fn run(mut self) -> WorkerReport {
        let progress = Arc::clone(&self.context.progress);
        progress.set_worker_running(true);
        let _running = RunningGuard(&progress);

        info!(output = %self.output_directory.display(), "Encode worker started");

        while self.state != WorkerState::Stopped {
            let step = match self.state {
                WorkerState::Draining => self.drain(),
                _ => {
                    let item = self.consumer.next();
                    self.step(item)
                }
            };

            if let Err(e) = step {
                error!("Encode worker stopping early: {}", e);
                self.report.exit = WorkerExit::Fatal(e.to_string());
                self.state = WorkerState::Stopped;
            }
        }

        info!(
            written = self.report.frames_written,
            dropped = self.report.frames_dropped,
            stale = self.report.stale_frames,
            mean_encode_ms = self.report.timings.mean().as_secs_f64() * 1000.0,
            exit = ?self.report.exit,
            "Encode worker exiting"
        );
        self.report
    }

    /// Advances the state machine by one queue item. Only worker-fatal errors are returned.
    fn step(&mut self, item: QueueItem) -> Result<()> {
        match (self.state, item) {
            (WorkerState::AwaitingFirstFrame, QueueItem::EndOfSession) => {
                info!("Session ended before any frame arrived");
                self.report.exit = WorkerExit::EmptySession;
                self.state = WorkerState::Stopped;
                Ok(())
            }
            (WorkerState::Streaming, QueueItem::EndOfSession) => {
                debug!("End of session marker received");
                self.state = WorkerState::Draining;
                Ok(())
            }
            (WorkerState::AwaitingFirstFrame | WorkerState::Streaming, QueueItem::Frame(queued)) => {
                self.handle_frame(queued)
            }
            (WorkerState::Draining | WorkerState::Stopped, _) => Ok(()),
        }
    }

    fn handle_frame(&mut self, queued: QueuedFrame) -> Result<()> {
        if queued.session_id != self.session_id {
            self.report.stale_frames += 1;
            debug!(from = %queued.session_id, "Discarding frame from another session");
            return Ok(());
        }

        let shape = queued.frame.shape();
        let samples = match queued.frame.into_u16_samples() {
            Ok(samples) => samples,
            Err(e) => {
                self.drop_frame(queued.enqueue_index, &e);
                return Ok(());
            }
        };

        match self.shape {
            None => self.configure(shape)?,
            Some(expected) if expected != shape => {
                let e = RecorderError::ShapeMismatch {
                    expected_width: expected.width,
                    expected_height: expected.height,
                    width: shape.width,
                    height: shape.height,
                };
                self.drop_frame(queued.enqueue_index, &e);
                return Ok(());
            }
            Some(_) => self.apply_live_refresh(),
        }

        self.encode(&samples)
    }

    /// Finalizes the session metadata from the first frame and configures the encoder once.
    fn configure(&mut self, shape: FrameShape) -> Result<()> {
        let _span = tracing::info_span!("configure_encoder", width = shape.width, height = shape.height).entered();

        let width = u32::try_from(shape.width)
            .map_err(|_| RecorderError::Configuration(format!("frame width {} too large", shape.width)))?;
        let height = u32::try_from(shape.height)
            .map_err(|_| RecorderError::Configuration(format!("frame height {} too large", shape.height)))?;

        let gains = self.context.white_balance.recorded();
        let exposure_us = self.context.exposure.exposure_us();
        let metadata = self.context.metadata_builder.build(
            &self.context.profile,
            &gains,
            width,
            height,
            exposure_us,
        );

        self.encoder.configure(&metadata)?;
        self.seen_generation = self.context.live.publish(metadata);
        self.shape = Some(shape);
        self.state = WorkerState::Streaming;

        info!(
            width,
            height,
            exposure_us = exposure_us.unwrap_or(0),
            "Session metadata finalized"
        );
        Ok(())
    }

    /// Re-applies the live configuration if the white balance trigger touched it.
    fn apply_live_refresh(&mut self) {
        let generation = self.context.live.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;

        let Some(metadata) = self.context.live.snapshot() else {
            return;
        };
        match self.encoder.configure(&metadata) {
            Ok(()) => {
                self.report.encoder_refreshes += 1;
                debug!(generation, "Encoder configuration refreshed");
            }
            Err(e) => warn!("Failed to refresh encoder configuration: {}", e),
        }
    }

    fn encode(&mut self, samples: &[u16]) -> Result<()> {
        let path = self
            .output_directory
            .join(format!("frame_{:06}", self.frame_counter));

        let timer = Timer::start("encode_frame");
        match self.encoder.encode(samples, &path) {
            Ok(written) => {
                let (_, duration) = timer.stop();
                self.report.timings.record(duration);
                self.report.frames_written += 1;
                self.context.progress.record_written();
                debug!(
                    frame = self.frame_counter,
                    path = %written.display(),
                    ms = duration.as_secs_f64() * 1000.0,
                    "Frame written"
                );
                self.frame_counter += 1;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.drop_frame(self.frame_counter, &e);
                Ok(())
            }
        }
    }

    fn drop_frame(&mut self, index: usize, reason: &RecorderError) {
        self.report.frames_dropped += 1;
        self.context.progress.record_error();
        error!(frame = index, "Dropping frame: {}", reason);
    }

    fn drain(&mut self) -> Result<()> {
        self.encoder.finish()?;
        self.state = WorkerState::Stopped;
        Ok(())
    }
}
