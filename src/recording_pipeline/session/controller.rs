use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::recording_pipeline::color::{CfaPattern, ColorProfile, WhiteBalanceGains, WhiteBalanceState};
use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::dng::{DngWriter, FrameEncoder, LiveMetadata, MetadataBuilder};
use crate::recording_pipeline::raw::{ExposureSource, NoExposure, RawFrame};
use crate::recording_pipeline::session::encode_worker::{EncodeWorker, WorkerContext};
use crate::recording_pipeline::session::frame_buffer::{FrameBuffer, QueuedFrame};
use crate::recording_pipeline::session::types::{
    AddFrameOutcome, Clock, RecorderConfig, SESSION_DIR_FORMAT, SessionInfo, SessionProgress,
    SessionStatus, StopOutcome, SystemClock, WorkerExit, WorkerReport,
};

const WORKER_THREAD_NAME: &str = "encode-worker";

/// Handle on the worker of the session currently recording.
struct ActiveSession {
    info: SessionInfo,
    done_rx: Receiver<WorkerReport>,
}

struct RecorderState {
    status: SessionStatus,
    session: Option<ActiveSession>,
    /// Queue of the most recent session; kept after stop so the next start can discard it.
    buffer: Option<FrameBuffer>,
    frames_enqueued: usize,
    progress: Arc<SessionProgress>,
    last_stop_outcome: Option<StopOutcome>,
}

/// Owns the recording session lifecycle.
///
/// Every method takes `&self`; the recorder can be shared between the capture loop and
/// whatever toggles recording.
pub struct Recorder<E = DngWriter>
where
    E: FrameEncoder + Clone + 'static,
{
    config: RecorderConfig,
    encoder: E,
    profile: Arc<ColorProfile>,
    white_balance: Arc<WhiteBalanceState>,
    exposure: Arc<dyn ExposureSource>,
    clock: Arc<dyn Clock>,
    metadata_builder: MetadataBuilder,
    state: Mutex<RecorderState>,
}

impl Recorder<DngWriter> {
    /// Creates a recorder writing DNG files with the default encoder settings.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        Self::with_custom(DngWriter::default(), config)
    }
}

impl<E> Recorder<E>
where
    E: FrameEncoder + Clone + 'static,
{
    /// Creates a recorder around a custom encoder.
    ///
    /// Validates the whole configuration and creates the storage root; any failure here is
    /// fatal to the caller.
    pub fn with_custom(encoder: E, config: RecorderConfig) -> Result<Self> {
        let cfa_pattern = CfaPattern::from_config(&config.cfa_pattern)?;
        let initial_gains = WhiteBalanceGains::from_slice(&config.initial_white_balance_gains)
            .map_err(|e| RecorderError::Configuration(format!("initial white balance: {e}")))?;

        if config.max_buffer_frames == 0 {
            return Err(RecorderError::Configuration(
                "max_buffer_frames must be at least 1".to_string(),
            ));
        }

        fs::create_dir_all(&config.storage_path).map_err(|e| RecorderError::StorageUnavailable {
            path: config.storage_path.clone(),
            reason: e.to_string(),
        })?;

        info!(
            storage = %config.storage_path.display(),
            cfa = ?cfa_pattern,
            max_buffer_frames = config.max_buffer_frames,
            encoder = encoder.extension(),
            "Recorder ready"
        );

        Ok(Self {
            profile: Arc::new(ColorProfile::f16(cfa_pattern)),
            white_balance: Arc::new(WhiteBalanceState::new(
                initial_gains,
                config.neutral_point_policy,
            )),
            exposure: Arc::new(NoExposure),
            clock: Arc::new(SystemClock),
            metadata_builder: MetadataBuilder::new(config.neutral_point_policy),
            state: Mutex::new(RecorderState {
                status: SessionStatus::Idle,
                session: None,
                buffer: None,
                frames_enqueued: 0,
                progress: Arc::new(SessionProgress::default()),
                last_stop_outcome: None,
            }),
            encoder,
            config,
        })
    }

    /// Source of the exposure reading taken when a session's first frame arrives.
    pub fn with_exposure_source(mut self, exposure: Arc<dyn ExposureSource>) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_profile(mut self, profile: ColorProfile) -> Self {
        self.profile = Arc::new(profile);
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn profile(&self) -> &ColorProfile {
        &self.profile
    }

    pub fn white_balance(&self) -> Arc<WhiteBalanceState> {
        Arc::clone(&self.white_balance)
    }

    pub fn update_white_balance_gains(&self, gains: &[f64]) -> Result<WhiteBalanceGains> {
        self.white_balance.update(gains)
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn is_recording(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    pub fn queue_depth(&self) -> usize {
        self.lock().buffer.as_ref().map_or(0, FrameBuffer::depth)
    }

    /// Frames accepted into the current, or most recent, session.
    pub fn frames_enqueued(&self) -> usize {
        self.lock().frames_enqueued
    }

    /// Worker counters of the current, or most recent, session.
    pub fn progress(&self) -> Arc<SessionProgress> {
        Arc::clone(&self.lock().progress)
    }

    pub fn active_session(&self) -> Option<SessionInfo> {
        self.lock().session.as_ref().map(|session| session.info.clone())
    }

    pub fn last_stop_outcome(&self) -> Option<StopOutcome> {
        self.lock().last_stop_outcome.clone()
    }

    /// Opens a new session folder and spawns its encode worker.
    ///
    /// On error nothing changes and the call may be retried.
    pub fn start(&self) -> Result<SessionInfo> {
        let mut state = self.lock();
        if matches!(state.status, SessionStatus::Active | SessionStatus::Draining) {
            return Err(RecorderError::AlreadyActive);
        }

        let started_at = self.clock.now();
        let id = started_at.format(SESSION_DIR_FORMAT).to_string();
        let output_directory = self.config.storage_path.join(&id);

        fs::create_dir(&output_directory).map_err(|e| RecorderError::SessionDirectory {
            path: output_directory.clone(),
            reason: e.to_string(),
        })?;

        let buffer = FrameBuffer::new();
        let progress = Arc::new(SessionProgress::default());
        let live = Arc::new(LiveMetadata::new());
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let worker = EncodeWorker::new(
            id.clone(),
            output_directory.clone(),
            buffer.consumer(),
            self.encoder.clone(),
            WorkerContext {
                profile: Arc::clone(&self.profile),
                white_balance: Arc::clone(&self.white_balance),
                exposure: Arc::clone(&self.exposure),
                metadata_builder: self.metadata_builder,
                live: Arc::clone(&live),
                progress: Arc::clone(&progress),
            },
        );

        progress.set_worker_running(true);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let report = worker.run();
                // The recorder may have given up waiting; nobody to tell then.
                let _ = done_tx.send(report);
            });

        if let Err(e) = spawned {
            progress.set_worker_running(false);
            if let Err(cleanup) = fs::remove_dir(&output_directory) {
                warn!("Failed to remove unused session folder: {}", cleanup);
            }
            return Err(RecorderError::IoError(e));
        }

        // Dropping the previous queue disconnects a worker that never finished draining it.
        if let Some(previous) = state.buffer.replace(buffer) {
            let discarded = previous.discard_pending();
            if discarded > 0 {
                warn!(discarded, "Discarded frames left over from the previous session");
            }
        }

        let info = SessionInfo {
            id,
            output_directory,
            started_at,
        };

        self.white_balance.attach_live(live);
        state.session = Some(ActiveSession {
            info: info.clone(),
            done_rx,
        });
        state.frames_enqueued = 0;
        state.progress = progress;
        state.status = SessionStatus::Active;

        info!(
            session = %info.id,
            output = %info.output_directory.display(),
            "Recording started"
        );
        Ok(info)
    }

    /// Hands a frame to the encode worker without blocking.
    pub fn add_frame(&self, frame: RawFrame) -> AddFrameOutcome {
        let mut state = self.lock();
        if state.status != SessionStatus::Active {
            return AddFrameOutcome::NotRecording;
        }
        if frame.is_empty() {
            debug!("Ignoring empty frame");
            return AddFrameOutcome::EmptyFrame;
        }

        if state.frames_enqueued >= self.config.max_buffer_frames {
            info!(
                max_buffer_frames = self.config.max_buffer_frames,
                "Frame cap reached, stopping recording"
            );
            drop(state);
            return AddFrameOutcome::CapReached(self.stop());
        }

        // The worker exits early only on a fatal error; nothing would consume the frame.
        if !state.progress.worker_running() {
            warn!(
                frames_enqueued = state.frames_enqueued,
                "Encode worker has exited, dropping frame"
            );
            return AddFrameOutcome::Dropped;
        }

        let RecorderState {
            session,
            buffer,
            frames_enqueued,
            ..
        } = &mut *state;
        let (Some(session), Some(buffer)) = (session.as_ref(), buffer.as_ref()) else {
            return AddFrameOutcome::NotRecording;
        };

        let queued = QueuedFrame {
            session_id: session.info.id.clone(),
            enqueue_index: *frames_enqueued,
            frame,
        };
        match buffer.push_frame(queued) {
            Ok(()) => {
                *frames_enqueued += 1;
                AddFrameOutcome::Enqueued {
                    frames_enqueued: *frames_enqueued,
                }
            }
            Err(e) => {
                warn!("Failed to enqueue frame: {}", e);
                AddFrameOutcome::Dropped
            }
        }
    }

    /// Ends the active session and waits, up to the join timeout, for its worker to drain.
    pub fn stop(&self) -> StopOutcome {
        let session = {
            let mut state = self.lock();
            if state.status != SessionStatus::Active {
                return StopOutcome::NotActive;
            }
            let Some(session) = state.session.take() else {
                state.status = SessionStatus::Closed;
                return StopOutcome::NotActive;
            };
            state.status = SessionStatus::Draining;
            if let Some(buffer) = state.buffer.as_ref() {
                if let Err(e) = buffer.push_end_of_session() {
                    warn!("Failed to enqueue end of session: {}", e);
                }
            }
            info!(
                session = %session.info.id,
                frames_enqueued = state.frames_enqueued,
                queued = state.buffer.as_ref().map_or(0, FrameBuffer::depth),
                "Stopping recording, draining queue"
            );
            session
        };

        let session_id = session.info.id.clone();
        let outcome = match session.done_rx.recv_timeout(self.config.join_timeout) {
            Ok(report) => {
                if matches!(report.exit, WorkerExit::Fatal(_)) {
                    error!(session = %session_id, exit = ?report.exit, "Encode worker failed");
                    StopOutcome::WorkerFailed(report)
                } else {
                    info!(
                        session = %session_id,
                        frames_written = report.frames_written,
                        frames_dropped = report.frames_dropped,
                        fps = report.timings.sustained_fps().unwrap_or(0.0),
                        "Recording stopped"
                    );
                    StopOutcome::Completed(report)
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    session = %session_id,
                    timeout_s = self.config.join_timeout.as_secs_f64(),
                    "Encode worker still busy, leaving it to finish in the background"
                );
                StopOutcome::TimedOut { session_id }
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(session = %session_id, "Encode worker exited without reporting");
                StopOutcome::Crashed { session_id }
            }
        };

        self.white_balance.detach_live();

        let mut state = self.lock();
        state.status = SessionStatus::Closed;
        state.last_stop_outcome = Some(outcome.clone());
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Recorder state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
