//! Tracing for tests.
//!
//! [`init_test_tracing`] routes events through the test-harness writer so they
//! show up next to a failing test. The modswitch crates log at `debug`,
//! everything else at `info`, unless `RUST_LOG` says otherwise.

use tracing_subscriber::EnvFilter;

const DEFAULT_TEST_FILTER: &str = "info,modswitch_core=debug,modswitch_config=debug";

/// Install the test subscriber. Later calls in the same process are no-ops.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
