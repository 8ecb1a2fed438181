pub use tracing::{debug, error, info, warn, trace, instrument};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Installs the global subscriber, `RUST_LOG` overriding the `info` default.
///
/// Panics if a subscriber is already installed; use [`try_init`] where that can happen.
pub fn init() {
    init_with_default("info");
}

pub fn init_with_default(default_directive: &str) {
    if let Err(e) = try_init_with_default(default_directive) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Like [`init`], but returns an error instead of panicking when a subscriber already exists.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    try_init_with_default("info")
}

fn try_init_with_default(default_directive: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Encode spans are per frame; only report their timings when debugging.
    let is_debug = env_filter.to_string().contains("debug")
        || std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}
