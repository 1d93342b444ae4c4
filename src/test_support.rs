//=========================================================================
// Test Support
//=========================================================================
//
// Shared helpers for the inline unit tests.
//
//=========================================================================

use env_logger::{Builder, Env};

/// Routes `log` output through the test harness.
///
/// Safe to call from every test; only the first call installs the logger.
/// Set `RUST_LOG=trace` to see router and overlay traces.
pub(crate) fn init_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}
