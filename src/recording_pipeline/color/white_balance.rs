use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::recording_pipeline::common::error::{RecorderError, Result};
use crate::recording_pipeline::dng::metadata::{LiveMetadata, NeutralPointPolicy};

/// Smallest gain accepted from a white balance trigger.
const MIN_GAIN: f64 = 1e-9;

/// Per-channel multiplicative color correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalanceGains {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl WhiteBalanceGains {
    pub const NEUTRAL: WhiteBalanceGains = WhiteBalanceGains {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
    };

    /// Validates a `[red, green, blue]` triple; every component must be finite and positive.
    pub fn from_slice(gains: &[f64]) -> Result<Self> {
        let [red, green, blue] = gains else {
            return Err(RecorderError::InvalidWhiteBalance(format!(
                "expected 3 gains, got {}",
                gains.len()
            )));
        };

        for (channel, gain) in [("red", red), ("green", green), ("blue", blue)] {
            if !gain.is_finite() || *gain <= MIN_GAIN {
                return Err(RecorderError::InvalidWhiteBalance(format!(
                    "{channel} gain must be positive, got {gain}"
                )));
            }
        }

        Ok(Self {
            red: *red,
            green: *green,
            blue: *blue,
        })
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

impl Default for WhiteBalanceGains {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

struct Inner {
    /// What the driver is applying upstream. Informational only.
    applied: WhiteBalanceGains,
    /// What the next session's metadata is built from.
    recorded: WhiteBalanceGains,
    live: Option<Arc<LiveMetadata>>,
}

/// Guarded white balance shared between the recorder and whoever runs the WB trigger.
pub struct WhiteBalanceState {
    inner: Mutex<Inner>,
    policy: NeutralPointPolicy,
}

impl WhiteBalanceState {
    pub fn new(initial: WhiteBalanceGains, policy: NeutralPointPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                applied: initial,
                recorded: initial,
                live: None,
            }),
            policy,
        }
    }

    pub fn policy(&self) -> NeutralPointPolicy {
        self.policy
    }

    pub fn applied(&self) -> WhiteBalanceGains {
        self.lock().applied
    }

    pub fn recorded(&self) -> WhiteBalanceGains {
        self.lock().recorded
    }

    /// Replaces both gain copies after validation; rejected input leaves them untouched.
    ///
    /// While a session is streaming under [`NeutralPointPolicy::Forced`], the in-flight encoder
    /// configuration is re-stamped with the forced neutral point. That never changes the tags
    /// already chosen for the session; new gains reach the metadata of the next session.
    pub fn update(&self, gains: &[f64]) -> Result<WhiteBalanceGains> {
        let gains = WhiteBalanceGains::from_slice(gains)?;

        let live = {
            let mut inner = self.lock();
            inner.applied = gains;
            inner.recorded = gains;
            inner.live.clone()
        };

        info!(
            red = format_args!("{:.3}", gains.red),
            green = format_args!("{:.3}", gains.green),
            blue = format_args!("{:.3}", gains.blue),
            "White balance gains updated"
        );

        if let Some(live) = live {
            match self.policy {
                NeutralPointPolicy::Forced => {
                    if live.refresh_neutral() {
                        debug!("In-flight neutral point re-stamped to neutral");
                    } else {
                        debug!("Session has no encoder configuration yet, nothing to refresh");
                    }
                }
                NeutralPointPolicy::TrackGains => {
                    debug!("Gains take effect from the next session");
                }
            }
        }

        Ok(gains)
    }

    pub(crate) fn attach_live(&self, live: Arc<LiveMetadata>) {
        self.lock().live = Some(live);
    }

    pub(crate) fn detach_live(&self) {
        self.lock().live = None;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Gains are plain data; a panic elsewhere while holding the lock cannot leave them torn.
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("White balance lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
