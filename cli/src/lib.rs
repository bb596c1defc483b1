//! Entry-point plumbing for the five engine binaries.
//!
//! Each binary parses its own arguments, loads the config, and delegates to
//! a command module here. The command modules stay generic over the cloud
//! provider and scheduler client so they can be driven by test doubles.

pub mod export;
pub mod jobquery;
pub mod resume;
pub mod state_manager;
pub mod suspend;
pub mod validate;

use std::time::Duration;

/// Whole-invocation time limits.
pub const RESUME_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const SUSPEND_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const SWEEP_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Initialise tracing from the configured level, overridable by the
/// standard env filter variable.
pub fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
