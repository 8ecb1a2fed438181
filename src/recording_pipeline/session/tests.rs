#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use chrono::{DateTime, Local};
    use tempfile::TempDir;

    use crate::recording_pipeline::color::CfaPattern;
    use crate::recording_pipeline::common::error::{RecorderError, Result};
    use crate::recording_pipeline::dng::{FrameEncoder, NeutralPointPolicy, Rational, SessionMetadata};
    use crate::recording_pipeline::raw::{ExposureSource, RawFrame, RawSamples};
    use crate::recording_pipeline::session::{
        AddFrameOutcome, Clock, FrameBuffer, QueueItem, QueuedFrame, Recorder, RecorderConfig,
        SessionStatus, StopOutcome, WorkerExit,
    };

    #[derive(Default)]
    struct EncoderLog {
        configured: Vec<SessionMetadata>,
        written: Vec<(PathBuf, Vec<u16>)>,
        encode_calls: usize,
        finished: usize,
    }

    #[derive(Clone, Default)]
    struct MockEncoder {
        log: Arc<Mutex<EncoderLog>>,
        /// Encode calls (0-based) that fail with a per-frame error.
        failing_calls: Vec<usize>,
        /// Every encode after this many successes reports the encoder gone.
        fatal_after: Option<usize>,
        panic_on_encode: bool,
        delay: Option<Duration>,
    }

    impl MockEncoder {
        fn written_names(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .written
                .iter()
                .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        }
    }

    impl FrameEncoder for MockEncoder {
        fn configure(&mut self, metadata: &SessionMetadata) -> Result<()> {
            self.log.lock().unwrap().configured.push(metadata.clone());
            Ok(())
        }

        fn encode(&mut self, samples: &[u16], path_without_extension: &Path) -> Result<PathBuf> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.panic_on_encode {
                panic!("mock encoder exploded");
            }

            let mut log = self.log.lock().unwrap();
            let call = log.encode_calls;
            log.encode_calls += 1;

            if self.fatal_after.is_some_and(|n| log.written.len() >= n) {
                return Err(RecorderError::EncoderUnavailable("mock encoder gone".to_string()));
            }
            if self.failing_calls.contains(&call) {
                return Err(RecorderError::EncodeError("mock encode error".to_string()));
            }

            let path = path_without_extension.to_path_buf();
            log.written.push((path.clone(), samples.to_vec()));
            Ok(path)
        }

        fn finish(&mut self) -> Result<()> {
            self.log.lock().unwrap().finished += 1;
            Ok(())
        }

        fn extension(&self) -> &'static str {
            "mock"
        }
    }

    /// Advances one second per call so back-to-back sessions get distinct folders.
    struct SteppingClock {
        base: DateTime<Local>,
        calls: AtomicI64,
    }

    impl SteppingClock {
        fn new() -> Self {
            Self {
                base: Local::now(),
                calls: AtomicI64::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Local> {
            let step = self.calls.fetch_add(1, Ordering::SeqCst);
            self.base + chrono::Duration::seconds(step)
        }
    }

    struct FrozenClock(DateTime<Local>);

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    struct FixedExposure(Option<u32>);

    impl ExposureSource for FixedExposure {
        fn exposure_us(&self) -> Option<u32> {
            self.0
        }
    }

    fn frame(width: usize, height: usize) -> RawFrame {
        RawFrame::from_u16(width, height, vec![30u16; width * height])
    }

    fn config_in(dir: &TempDir) -> RecorderConfig {
        RecorderConfig::builder()
            .storage_path(dir.path().join("storage"))
            .build()
    }

    fn recorder_with(encoder: MockEncoder, config: RecorderConfig) -> Recorder<MockEncoder> {
        Recorder::with_custom(encoder, config)
            .unwrap()
            .with_clock(Arc::new(SteppingClock::new()))
    }

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn completed(outcome: StopOutcome) -> crate::recording_pipeline::session::WorkerReport {
        match outcome {
            StopOutcome::Completed(report) => report,
            other => panic!("expected a completed stop, got {other:?}"),
        }
    }

    #[test]
    fn test_config_builder() {
        let config = RecorderConfig::builder()
            .storage_path("/tmp/rolls")
            .cfa_pattern(&[0, 1, 1, 2])
            .initial_white_balance_gains(&[1.5, 1.0, 1.2])
            .max_buffer_frames(24)
            .join_timeout(Duration::from_secs(2))
            .neutral_point_policy(NeutralPointPolicy::TrackGains)
            .build();

        assert_eq!(config.storage_path, PathBuf::from("/tmp/rolls"));
        assert_eq!(config.cfa_pattern, vec![0, 1, 1, 2]);
        assert_eq!(config.initial_white_balance_gains, vec![1.5, 1.0, 1.2]);
        assert_eq!(config.max_buffer_frames, 24);
        assert_eq!(config.join_timeout, Duration::from_secs(2));
        assert_eq!(config.neutral_point_policy, NeutralPointPolicy::TrackGains);

        let defaults = RecorderConfig::default();
        assert_eq!(defaults.cfa_pattern, vec![1, 2, 0, 1]);
        assert_eq!(defaults.max_buffer_frames, 3000);
        assert_eq!(defaults.join_timeout, Duration::from_secs(30));
        assert_eq!(defaults.neutral_point_policy, NeutralPointPolicy::Forced);
    }

    #[test]
    fn test_construction_creates_storage_root() {
        let dir = TempDir::new().unwrap();
        let config = RecorderConfig::builder()
            .storage_path(dir.path().join("a").join("b"))
            .build();

        let recorder = Recorder::with_custom(MockEncoder::default(), config).unwrap();

        assert!(dir.path().join("a").join("b").is_dir());
        assert_eq!(recorder.status(), SessionStatus::Idle);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_invalid_cfa_length_rejected() {
        let dir = TempDir::new().unwrap();
        let config = RecorderConfig::builder()
            .storage_path(dir.path())
            .cfa_pattern(&[1, 2, 0])
            .build();

        let result = Recorder::with_custom(MockEncoder::default(), config);
        assert!(matches!(result, Err(RecorderError::Configuration(_))));
    }

    #[test]
    fn test_unknown_cfa_falls_back_to_gbrg() {
        let dir = TempDir::new().unwrap();
        let config = RecorderConfig::builder()
            .storage_path(dir.path())
            .cfa_pattern(&[2, 2, 2, 2])
            .build();

        let recorder = Recorder::with_custom(MockEncoder::default(), config).unwrap();
        assert_eq!(recorder.profile().cfa_pattern, CfaPattern::Gbrg);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let dir = TempDir::new().unwrap();

        let zero_cap = RecorderConfig::builder()
            .storage_path(dir.path())
            .max_buffer_frames(0)
            .build();
        assert!(matches!(
            Recorder::with_custom(MockEncoder::default(), zero_cap),
            Err(RecorderError::Configuration(_))
        ));

        let bad_gains = RecorderConfig::builder()
            .storage_path(dir.path())
            .initial_white_balance_gains(&[1.0, 0.0, 1.0])
            .build();
        assert!(matches!(
            Recorder::with_custom(MockEncoder::default(), bad_gains),
            Err(RecorderError::Configuration(_))
        ));
    }

    #[test]
    fn test_add_frame_while_idle_is_noop() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_with(MockEncoder::default(), config_in(&dir));

        assert_eq!(recorder.add_frame(frame(4, 4)), AddFrameOutcome::NotRecording);
        assert_eq!(recorder.queue_depth(), 0);
        assert_eq!(recorder.frames_enqueued(), 0);
        assert_eq!(recorder.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let storage = config.storage_path.clone();
        let recorder = recorder_with(MockEncoder::default(), config);

        assert_eq!(recorder.stop(), StopOutcome::NotActive);
        assert_eq!(recorder.status(), SessionStatus::Idle);
        assert_eq!(recorder.queue_depth(), 0);
        assert!(recorder.last_stop_outcome().is_none());
        assert_eq!(std::fs::read_dir(storage).unwrap().count(), 0);
    }

    #[test]
    fn test_start_while_active_fails() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_with(MockEncoder::default(), config_in(&dir));

        let session = recorder.start().unwrap();
        assert!(session.output_directory.is_dir());
        assert!(recorder.is_recording());
        assert!(matches!(recorder.start(), Err(RecorderError::AlreadyActive)));

        recorder.stop();
        assert_eq!(recorder.status(), SessionStatus::Closed);
    }

    #[test]
    fn test_frames_written_in_order() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        let session = recorder.start().unwrap();
        for i in 0..5u16 {
            let outcome = recorder.add_frame(RawFrame::from_u16(2, 2, vec![i; 4]));
            assert_eq!(
                outcome,
                AddFrameOutcome::Enqueued {
                    frames_enqueued: i as usize + 1
                }
            );
        }
        let report = completed(recorder.stop());

        assert_eq!(report.session_id, session.id);
        assert_eq!(report.frames_written, 5);
        assert_eq!(report.frames_dropped, 0);
        assert_eq!(report.exit, WorkerExit::Clean);
        assert_eq!(report.timings.frames(), 5);
        assert_eq!(
            log.written_names(),
            vec!["frame_000000", "frame_000001", "frame_000002", "frame_000003", "frame_000004"]
        );

        let log = log.log.lock().unwrap();
        assert_eq!(log.configured.len(), 1);
        assert_eq!(log.finished, 1);
        for (i, (path, samples)) in log.written.iter().enumerate() {
            assert_eq!(path.parent().unwrap(), session.output_directory);
            assert_eq!(samples, &vec![i as u16; 4]);
        }
        assert_eq!(recorder.progress().frames_written(), 5);
        assert!(!recorder.progress().worker_running());
        assert_eq!(recorder.last_stop_outcome().unwrap().report().unwrap().frames_written, 5);
    }

    #[test]
    fn test_empty_frame_ignored() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_with(MockEncoder::default(), config_in(&dir));

        recorder.start().unwrap();
        assert_eq!(recorder.add_frame(frame(0, 0)), AddFrameOutcome::EmptyFrame);
        assert_eq!(
            recorder.add_frame(RawFrame::new(4, 4, RawSamples::U16(Vec::new()))),
            AddFrameOutcome::EmptyFrame
        );
        assert_eq!(recorder.frames_enqueued(), 0);
        recorder.stop();
    }

    #[test]
    fn test_empty_session_reports_empty() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        let report = completed(recorder.stop());

        assert_eq!(report.exit, WorkerExit::EmptySession);
        assert_eq!(report.frames_written, 0);
        let log = log.log.lock().unwrap();
        assert!(log.configured.is_empty());
        assert_eq!(log.finished, 0);
    }

    #[test]
    fn test_frame_cap_triggers_stop() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let config = RecorderConfig::builder()
            .storage_path(dir.path())
            .max_buffer_frames(3)
            .build();
        let recorder = recorder_with(encoder, config);

        recorder.start().unwrap();
        for _ in 0..3 {
            assert!(matches!(recorder.add_frame(frame(2, 2)), AddFrameOutcome::Enqueued { .. }));
        }

        match recorder.add_frame(frame(2, 2)) {
            AddFrameOutcome::CapReached(outcome) => assert_eq!(outcome.report().unwrap().frames_written, 3),
            other => panic!("expected the cap to stop recording, got {other:?}"),
        }
        assert_eq!(recorder.status(), SessionStatus::Closed);
        assert!(!recorder.is_recording());
        assert_eq!(recorder.frames_enqueued(), 3);
        assert_eq!(log.written_names().len(), 3);

        assert_eq!(recorder.add_frame(frame(2, 2)), AddFrameOutcome::NotRecording);
    }

    #[test]
    fn test_mismatched_shape_dropped() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        recorder.add_frame(frame(4, 4));
        recorder.add_frame(frame(4, 4));
        recorder.add_frame(frame(2, 2));
        recorder.add_frame(frame(4, 4));
        let report = completed(recorder.stop());

        assert_eq!(report.frames_written, 3);
        assert_eq!(report.frames_dropped, 1);
        assert_eq!(recorder.progress().frame_errors(), 1);
        assert_eq!(
            log.written_names(),
            vec!["frame_000000", "frame_000001", "frame_000002"]
        );
    }

    #[test]
    fn test_encode_failure_keeps_numbering_sequential() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder {
            failing_calls: vec![1],
            ..Default::default()
        };
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        for _ in 0..3 {
            recorder.add_frame(frame(2, 2));
        }
        let report = completed(recorder.stop());

        assert_eq!(report.frames_written, 2);
        assert_eq!(report.frames_dropped, 1);
        assert_eq!(log.written_names(), vec!["frame_000000", "frame_000001"]);
    }

    #[test]
    fn test_sample_types_coerced() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        recorder.add_frame(RawFrame::new(2, 1, RawSamples::U32(vec![70_000, 12])));
        recorder.add_frame(RawFrame::new(2, 1, RawSamples::F32(vec![0.0, 1.0])));
        recorder.add_frame(RawFrame::new(2, 1, RawSamples::F32(vec![f32::NAN, 1.0])));
        recorder.add_frame(RawFrame::new(2, 1, RawSamples::U8(vec![1, 255])));
        let report = completed(recorder.stop());

        assert_eq!(report.frames_written, 3);
        assert_eq!(report.frames_dropped, 1);
        let log = log.log.lock().unwrap();
        let samples: Vec<_> = log.written.iter().map(|(_, s)| s.clone()).collect();
        assert_eq!(samples, vec![vec![u16::MAX, 12], vec![0, u16::MAX], vec![1, 255]]);
    }

    #[test]
    fn test_invalid_white_balance_rejected() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_with(MockEncoder::default(), config_in(&dir));
        let before = recorder.white_balance().recorded();

        assert!(matches!(
            recorder.update_white_balance_gains(&[-1.0, 1.0, 1.0]),
            Err(RecorderError::InvalidWhiteBalance(_))
        ));
        assert!(recorder.update_white_balance_gains(&[1.0, f64::NAN, 1.0]).is_err());
        assert!(recorder.update_white_balance_gains(&[1.0, 1.0]).is_err());

        assert_eq!(recorder.white_balance().recorded(), before);
        assert_eq!(recorder.white_balance().applied(), before);
    }

    #[test]
    fn test_neutral_point_forced_after_gain_update() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        let gains = recorder.update_white_balance_gains(&[2.0, 1.0, 1.5]).unwrap();
        assert_eq!(recorder.white_balance().recorded(), gains);

        recorder.start().unwrap();
        recorder.add_frame(frame(4, 2));
        completed(recorder.stop());

        let log = log.log.lock().unwrap();
        let metadata = &log.configured[0];
        assert_eq!(metadata.as_shot_neutral, [Rational::new(10_000, 10_000); 3]);
        assert_eq!(metadata.width, 4);
        assert_eq!(metadata.height, 2);
        assert_eq!(metadata.default_crop_size, [4, 2]);
    }

    #[test]
    fn test_track_gains_policy_records_reciprocal() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let config = RecorderConfig::builder()
            .storage_path(dir.path())
            .neutral_point_policy(NeutralPointPolicy::TrackGains)
            .build();
        let recorder = recorder_with(encoder, config);

        recorder.update_white_balance_gains(&[2.0, 1.0, 1.25]).unwrap();
        recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        completed(recorder.stop());

        let log = log.log.lock().unwrap();
        assert_eq!(
            log.configured[0].as_shot_neutral,
            [
                Rational::new(5_000, 10_000),
                Rational::new(10_000, 10_000),
                Rational::new(8_000, 10_000)
            ]
        );
    }

    #[test]
    fn test_exposure_read_at_first_frame() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir))
            .with_exposure_source(Arc::new(FixedExposure(Some(20_833))));

        recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        completed(recorder.stop());

        let log = log.log.lock().unwrap();
        let metadata = &log.configured[0];
        assert_eq!(metadata.exposure_time, Some(Rational::new(20_833, 1_000_000)));
        assert!((metadata.exposure_seconds().unwrap() - 0.020833).abs() < 1e-9);
    }

    #[test]
    fn test_missing_exposure_omitted() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir))
            .with_exposure_source(Arc::new(FixedExposure(Some(0))));

        recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        completed(recorder.stop());

        assert_eq!(log.log.lock().unwrap().configured[0].exposure_time, None);
    }

    #[test]
    fn test_white_balance_refresh_while_streaming() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        let progress = recorder.progress();
        wait_for(|| progress.frames_written() == 1);

        recorder.update_white_balance_gains(&[1.8, 1.0, 1.4]).unwrap();
        recorder.add_frame(frame(2, 2));
        let report = completed(recorder.stop());

        assert_eq!(report.frames_written, 2);
        assert_eq!(report.encoder_refreshes, 1);
        let log = log.log.lock().unwrap();
        assert_eq!(log.configured.len(), 2);
        assert_eq!(log.configured[0], log.configured[1]);
    }

    #[test]
    fn test_back_to_back_sessions_use_distinct_directories() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder::default();
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        let first = recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        completed(recorder.stop());

        let second = recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        recorder.add_frame(frame(2, 2));
        completed(recorder.stop());

        assert_ne!(first.output_directory, second.output_directory);
        assert_eq!(first.id.len(), "YYYYMMDD_HHMMSS".len());

        let log = log.log.lock().unwrap();
        let parents: Vec<_> = log.written.iter().map(|(p, _)| p.parent().unwrap().to_path_buf()).collect();
        assert_eq!(
            parents,
            vec![
                first.output_directory.clone(),
                second.output_directory.clone(),
                second.output_directory.clone()
            ]
        );
        assert_eq!(log.written[1].0.file_name().unwrap(), "frame_000000");
        assert_eq!(recorder.frames_enqueued(), 2);
    }

    #[test]
    fn test_session_directory_collision_reported() {
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::with_custom(MockEncoder::default(), config_in(&dir))
            .unwrap()
            .with_clock(Arc::new(FrozenClock(Local::now())));

        recorder.start().unwrap();
        recorder.stop();

        assert!(matches!(recorder.start(), Err(RecorderError::SessionDirectory { .. })));
        assert_eq!(recorder.status(), SessionStatus::Closed);
    }

    #[test]
    fn test_join_timeout_reported() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder {
            delay: Some(Duration::from_millis(300)),
            ..Default::default()
        };
        let config = RecorderConfig::builder()
            .storage_path(dir.path())
            .join_timeout(Duration::from_millis(20))
            .build();
        let recorder = recorder_with(encoder, config);

        let session = recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));
        recorder.add_frame(frame(2, 2));

        assert_eq!(
            recorder.stop(),
            StopOutcome::TimedOut {
                session_id: session.id
            }
        );
        assert_eq!(recorder.status(), SessionStatus::Closed);

        // A new session can start while the old worker is still busy.
        recorder.start().unwrap();
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_worker_panic_reported_as_crash() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder {
            panic_on_encode: true,
            ..Default::default()
        };
        let recorder = recorder_with(encoder, config_in(&dir));

        let session = recorder.start().unwrap();
        recorder.add_frame(frame(2, 2));

        assert_eq!(
            recorder.stop(),
            StopOutcome::Crashed {
                session_id: session.id
            }
        );
        assert_eq!(recorder.status(), SessionStatus::Closed);
        assert!(!recorder.progress().worker_running());
    }

    #[test]
    fn test_fatal_encode_error_stops_worker() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder {
            fatal_after: Some(1),
            ..Default::default()
        };
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        for _ in 0..4 {
            recorder.add_frame(frame(2, 2));
        }

        match recorder.stop() {
            StopOutcome::WorkerFailed(report) => {
                assert_eq!(report.frames_written, 1);
                assert!(matches!(report.exit, WorkerExit::Fatal(_)));
            }
            other => panic!("expected a worker failure, got {other:?}"),
        }
        assert_eq!(log.written_names(), vec!["frame_000000"]);
        assert_eq!(log.log.lock().unwrap().encode_calls, 2);
    }

    #[test]
    fn test_add_frame_dropped_after_worker_exit() {
        let dir = TempDir::new().unwrap();
        let encoder = MockEncoder {
            fatal_after: Some(1),
            ..Default::default()
        };
        let log = encoder.clone();
        let recorder = recorder_with(encoder, config_in(&dir));

        recorder.start().unwrap();
        let progress = recorder.progress();
        recorder.add_frame(frame(2, 2));
        recorder.add_frame(frame(2, 2));
        wait_for(|| !progress.worker_running());

        assert_eq!(recorder.status(), SessionStatus::Active);
        for _ in 0..3 {
            assert_eq!(recorder.add_frame(frame(2, 2)), AddFrameOutcome::Dropped);
        }
        assert_eq!(recorder.frames_enqueued(), 2);
        assert_eq!(recorder.queue_depth(), 0);

        assert!(matches!(recorder.stop(), StopOutcome::WorkerFailed(_)));
        assert_eq!(log.log.lock().unwrap().encode_calls, 2);
    }

    #[test]
    fn test_frame_buffer_discards_pending() {
        let buffer = FrameBuffer::new();
        let consumer = buffer.consumer();

        for i in 0..3 {
            buffer
                .push_frame(QueuedFrame {
                    session_id: "old".to_string(),
                    enqueue_index: i,
                    frame: frame(2, 2),
                })
                .unwrap();
        }
        buffer.push_end_of_session().unwrap();
        assert_eq!(buffer.depth(), 4);

        assert_eq!(buffer.discard_pending(), 3);
        assert_eq!(buffer.depth(), 0);
        assert!(consumer.try_next().is_none());

        drop(buffer);
        assert!(matches!(consumer.try_next(), Some(QueueItem::EndOfSession)));
        assert!(matches!(consumer.next(), QueueItem::EndOfSession));
    }

    #[test]
    fn test_counters_shared_with_progress() {
        let dir = TempDir::new().unwrap();
        let recorder = recorder_with(MockEncoder::default(), config_in(&dir));

        recorder.start().unwrap();
        let progress = recorder.progress();
        assert!(progress.worker_running());
        recorder.add_frame(frame(2, 2));
        wait_for(|| progress.frames_written() == 1);

        recorder.stop();
        assert!(!progress.worker_running());
        assert_eq!(progress.frames_written(), 1);
        assert_eq!(progress.frame_errors(), 0);
    }
}
