//! Session configuration and status types

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::recording_pipeline::color::WhiteBalanceGains;
use crate::recording_pipeline::common::timing::EncodeTimings;
use crate::recording_pipeline::dng::NeutralPointPolicy;

/// Folder name format for a session, one folder per second of wall clock.
pub const SESSION_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const DEFAULT_MAX_BUFFER_FRAMES: usize = 3000;
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Active,
    Draining,
    Closed,
}

/// Source of session timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub output_directory: PathBuf,
    pub started_at: DateTime<Local>,
}

/// How a worker left its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Saw the end-of-session marker after at least one frame.
    Clean,
    /// Saw the end-of-session marker before any frame.
    EmptySession,
    /// Gave up early; frames enqueued after the failure were never written.
    Fatal(String),
}

/// Final accounting for one session, sent by the worker as it exits.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub session_id: String,
    pub frames_written: usize,
    /// Frames lost to shape mismatches, sample coercion or encode failures.
    pub frames_dropped: usize,
    /// Frames stamped with another session's id.
    pub stale_frames: usize,
    pub encoder_refreshes: usize,
    pub timings: EncodeTimings,
    pub exit: WorkerExit,
}

impl WorkerReport {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            frames_written: 0,
            frames_dropped: 0,
            stale_frames: 0,
            encoder_refreshes: 0,
            timings: EncodeTimings::new(),
            exit: WorkerExit::Clean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// No session was active; nothing happened.
    NotActive,
    /// The worker drained every frame and exited normally.
    Completed(WorkerReport),
    /// The worker stopped early on a fatal error.
    WorkerFailed(WorkerReport),
    /// The worker thread died without reporting.
    Crashed { session_id: String },
    /// The worker did not finish within the join timeout and is still running.
    TimedOut { session_id: String },
}

impl StopOutcome {
    pub fn report(&self) -> Option<&WorkerReport> {
        match self {
            StopOutcome::Completed(report) | StopOutcome::WorkerFailed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, StopOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddFrameOutcome {
    Enqueued { frames_enqueued: usize },
    NotRecording,
    EmptyFrame,
    /// The session hit `max_buffer_frames` and was stopped; the frame was not queued.
    CapReached(StopOutcome),
    /// The queue refused the frame; it was logged and discarded.
    Dropped,
}

/// Live counters of the session being recorded, shared with the worker.
#[derive(Debug, Default)]
pub struct SessionProgress {
    frames_written: AtomicUsize,
    frame_errors: AtomicUsize,
    worker_running: AtomicBool,
}

impl SessionProgress {
    pub fn frames_written(&self) -> usize {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn frame_errors(&self) -> usize {
        self.frame_errors.load(Ordering::Relaxed)
    }

    pub fn worker_running(&self) -> bool {
        self.worker_running.load(Ordering::Acquire)
    }

    pub(crate) fn record_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_worker_running(&self, running: bool) {
        self.worker_running.store(running, Ordering::Release);
    }
}

/// Configuration for the recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Root under which one folder per session is created
    pub storage_path: PathBuf,
    /// CFA layout as DNG color indices; must be exactly 4 entries
    pub cfa_pattern: Vec<u8>,
    pub initial_white_balance_gains: Vec<f64>,
    /// Frames accepted per session before it is stopped automatically
    pub max_buffer_frames: usize,
    /// How long `stop` waits for the worker to drain
    pub join_timeout: Duration,
    pub neutral_point_policy: NeutralPointPolicy,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("storage"),
            cfa_pattern: vec![1, 2, 0, 1],
            initial_white_balance_gains: WhiteBalanceGains::NEUTRAL.as_array().to_vec(),
            max_buffer_frames: DEFAULT_MAX_BUFFER_FRAMES,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            neutral_point_policy: NeutralPointPolicy::Forced,
        }
    }
}

impl RecorderConfig {
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }
}

/// Builder for RecorderConfig
#[derive(Default)]
pub struct RecorderConfigBuilder {
    storage_path: Option<PathBuf>,
    cfa_pattern: Option<Vec<u8>>,
    initial_white_balance_gains: Option<Vec<f64>>,
    max_buffer_frames: Option<usize>,
    join_timeout: Option<Duration>,
    neutral_point_policy: Option<NeutralPointPolicy>,
}

impl RecorderConfigBuilder {
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn cfa_pattern(mut self, pattern: &[u8]) -> Self {
        self.cfa_pattern = Some(pattern.to_vec());
        self
    }

    pub fn initial_white_balance_gains(mut self, gains: &[f64]) -> Self {
        self.initial_white_balance_gains = Some(gains.to_vec());
        self
    }

    pub fn max_buffer_frames(mut self, max: usize) -> Self {
        self.max_buffer_frames = Some(max);
        self
    }

    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    pub fn neutral_point_policy(mut self, policy: NeutralPointPolicy) -> Self {
        self.neutral_point_policy = Some(policy);
        self
    }

    pub fn build(self) -> RecorderConfig {
        let default = RecorderConfig::default();
        RecorderConfig {
            storage_path: self.storage_path.unwrap_or(default.storage_path),
            cfa_pattern: self.cfa_pattern.unwrap_or(default.cfa_pattern),
            initial_white_balance_gains: self
                .initial_white_balance_gains
                .unwrap_or(default.initial_white_balance_gains),
            max_buffer_frames: self.max_buffer_frames.unwrap_or(default.max_buffer_frames),
            join_timeout: self.join_timeout.unwrap_or(default.join_timeout),
            neutral_point_policy: self.neutral_point_policy.unwrap_or(default.neutral_point_policy),
        }
    }
}
