use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::recording_pipeline::capture::fps::{FpsMeter, shutter_angle};
use crate::recording_pipeline::common::error::Result;
use crate::recording_pipeline::dng::FrameEncoder;
use crate::recording_pipeline::session::{AddFrameOutcome, Recorder};
use crate::recording_pipeline::raw::SensorDriver;

/// Gain change per GainUp / GainDown command.
pub const GAIN_STEP: i32 = 10;

/// Operator input, already decoded from whatever keyboard or gamepad produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    ToggleRecording,
    GainUp,
    GainDown,
    WhiteBalance,
}

/// Everything the overlay needs for one displayed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStatus {
    pub fps: f64,
    pub gain: Option<i32>,
    pub exposure_us: Option<u32>,
    pub shutter_angle: Option<f64>,
    pub recording: bool,
    pub queue_depth: usize,
    pub preview_width: usize,
    pub preview_height: usize,
}

/// Drives one preview iteration at a time; never waits on the encoder.
pub struct CaptureLoop<D, E>
where
    D: SensorDriver,
    E: FrameEncoder + Clone + 'static,
{
    driver: Arc<D>,
    recorder: Arc<Recorder<E>>,
    fps: FpsMeter,
}

impl<D, E> CaptureLoop<D, E>
where
    D: SensorDriver,
    E: FrameEncoder + Clone + 'static,
{
    pub fn new(driver: Arc<D>, recorder: Arc<Recorder<E>>) -> Self {
        Self {
            driver,
            recorder,
            fps: FpsMeter::new(),
        }
    }

    pub fn recorder(&self) -> &Recorder<E> {
        &self.recorder
    }

    /// Grabs one frame and feeds the recorder with it. `None` if the driver had nothing.
    pub fn tick(&mut self) -> Option<CaptureStatus> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Option<CaptureStatus> {
        let Some(captured) = self.driver.grab_frame() else {
            debug!("Driver returned no frame");
            return None;
        };

        let fps = self.fps.record_frame(now);

        if self.recorder.is_recording() {
            match captured.raw {
                Some(raw) => {
                    if let AddFrameOutcome::CapReached(outcome) = self.recorder.add_frame(raw) {
                        info!(clean = outcome.is_clean(), "Recording stopped at the frame cap");
                    }
                }
                None => debug!("Frame had no raw payload"),
            }
        }

        let exposure_us = self.driver.exposure_us();
        Some(CaptureStatus {
            fps,
            gain: self.driver.gain(),
            exposure_us,
            shutter_angle: exposure_us.and_then(shutter_angle),
            recording: self.recorder.is_recording(),
            queue_depth: self.recorder.queue_depth(),
            preview_width: captured.preview_width,
            preview_height: captured.preview_height,
        })
    }

    pub fn handle(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::ToggleRecording => {
                if self.recorder.is_recording() {
                    let outcome = self.recorder.stop();
                    info!(?outcome, "Recording toggled off");
                } else {
                    let session = self.recorder.start()?;
                    info!(session = %session.id, "Recording toggled on");
                }
            }
            ControlCommand::GainUp => self.driver.set_gain(GAIN_STEP),
            ControlCommand::GainDown => self.driver.set_gain(-GAIN_STEP),
            ControlCommand::WhiteBalance => match self.driver.trigger_white_balance() {
                Some((red, blue)) if red > 0.0 => {
                    self.recorder.update_white_balance_gains(&[red, 1.0, blue])?;
                }
                _ => warn!("White balance trigger returned no usable gains"),
            },
        }
        Ok(())
    }
}
