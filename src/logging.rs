//! Log subscriber setup for binaries and tests embedding the library

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or `default_directive`
/// when the variable is unset or invalid (e.g. `"paddock=info"`).
///
/// Returns `false` if a global subscriber was already installed; calling it
/// more than once is harmless.
pub fn init(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}
