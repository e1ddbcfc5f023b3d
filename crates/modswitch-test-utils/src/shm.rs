//! Shared memory helpers for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A segment name no other test (or test process) uses.
pub fn unique_segment_name() -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/modswitch-test-{}-{n}", std::process::id())
}
