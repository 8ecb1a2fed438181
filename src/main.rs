use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use faux_bolex_rs::logger;
use faux_bolex_rs::recording_pipeline::capture::{CaptureLoop, ControlCommand};
use faux_bolex_rs::recording_pipeline::dng::{DngCompression, DngWriter, EncoderConfig};
use faux_bolex_rs::recording_pipeline::raw::{RawFileSensor, SensorDriver, SyntheticSensor, SyntheticSensorConfig};
use faux_bolex_rs::recording_pipeline::session::{Recorder, RecorderConfig, StopOutcome};

use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "faux_bolex")]
#[command(about = "Records raw sensor frames to per-session DNG sequences")]
#[command(version)]
struct Cli {
    /// Root folder; one subfolder is created per recording
    #[arg(short, long, default_value = "storage")]
    storage: PathBuf,

    /// Frames to record before stopping
    #[arg(short, long, default_value = "48")]
    frames: usize,

    /// Replay RAW stills from this folder instead of the synthetic sensor
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Synthetic sensor width
    #[arg(long, default_value = "640")]
    width: usize,

    /// Synthetic sensor height
    #[arg(long, default_value = "480")]
    height: usize,

    /// Frame rate the capture loop is paced at
    #[arg(long, default_value = "24")]
    fps: u32,

    /// CFA layout as four DNG color indices
    #[arg(long, value_delimiter = ',', default_value = "1,2,0,1")]
    cfa: Vec<u8>,

    /// Strip encoding; `deflate` output is not readable by DNG decoders
    #[arg(long, value_enum, default_value = "none")]
    compression: CompressionArg,

    /// Session frame cap
    #[arg(long, default_value = "3000")]
    max_buffer_frames: usize,

    /// Trigger a one-shot white balance before recording
    #[arg(long)]
    white_balance: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Deflate,
}

impl From<CompressionArg> for DngCompression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => DngCompression::None,
            CompressionArg::Deflate => DngCompression::Deflate,
        }
    }
}

fn main() -> anyhow::Result<()> {
    logger::init();

    let cli = Cli::parse();
    if cli.fps == 0 {
        bail!("--fps must be at least 1");
    }

    info!("Starting faux_bolex...");

    match &cli.raw_dir {
        Some(dir) => {
            let sensor = RawFileSensor::from_dir(dir)
                .with_context(|| format!("loading RAW files from {}", dir.display()))?;
            info!("Replaying {} RAW files from {}", sensor.len(), dir.display());
            record(Arc::new(sensor), &cli)
        }
        None => {
            let sensor = SyntheticSensor::new(SyntheticSensorConfig {
                width: cli.width,
                height: cli.height,
                ..Default::default()
            });
            info!("Using synthetic sensor {}x{}", cli.width, cli.height);
            record(Arc::new(sensor), &cli)
        }
    }
}

fn record<D: SensorDriver + 'static>(sensor: Arc<D>, cli: &Cli) -> anyhow::Result<()> {
    let config = RecorderConfig::builder()
        .storage_path(&cli.storage)
        .cfa_pattern(&cli.cfa)
        .max_buffer_frames(cli.max_buffer_frames)
        .build();
    let compression: DngCompression = cli.compression.into();
    let encoder = DngWriter::new(EncoderConfig::builder().compression(compression).build());

    let recorder = Recorder::with_custom(encoder, config)
        .context("initializing recorder")?
        .with_exposure_source(sensor.clone());

    info!("Compression: {:?}", compression);

    let mut capture = CaptureLoop::new(sensor, Arc::new(recorder));
    if cli.white_balance {
        capture.handle(ControlCommand::WhiteBalance)?;
    }

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(cli.fps));
    capture
        .handle(ControlCommand::ToggleRecording)
        .context("starting recording")?;

    let mut grabbed = 0;
    while grabbed < cli.frames && capture.recorder().is_recording() {
        match capture.tick() {
            Some(status) => {
                grabbed += 1;
                if grabbed % cli.fps as usize == 0 {
                    info!(
                        fps = format_args!("{:.1}", status.fps),
                        gain = status.gain.unwrap_or(-1),
                        angle = %status.shutter_angle.map(|a| format!("{a:.0}")).unwrap_or_else(|| "N/A".to_string()),
                        queued = status.queue_depth,
                        "Recording"
                    );
                }
            }
            None => warn!("No frame from sensor"),
        }
        std::thread::sleep(frame_interval);
    }

    if capture.recorder().is_recording() {
        capture.handle(ControlCommand::ToggleRecording)?;
    }

    match capture.recorder().last_stop_outcome() {
        Some(StopOutcome::Completed(report)) => {
            info!(
                "Wrote {} frames ({} dropped), mean encode {:.2} ms, slowest {:.2} ms",
                report.frames_written,
                report.frames_dropped,
                report.timings.mean().as_secs_f64() * 1000.0,
                report.timings.slowest().as_secs_f64() * 1000.0
            );
            Ok(())
        }
        Some(StopOutcome::TimedOut { session_id }) => {
            warn!("Session {} is still being written in the background", session_id);
            Ok(())
        }
        Some(other) => bail!("recording did not finish cleanly: {other:?}"),
        None => bail!("recording never started"),
    }
}
