//! Tracing subscriber setup for the `run` binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,rlexp=info";

/// Install a global fmt subscriber
///
/// The filter comes from `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].
/// Calling this twice is harmless: the second call leaves the first subscriber in place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
