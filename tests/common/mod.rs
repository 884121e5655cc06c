//! Common test utilities.
//!
//! `init_tracing` wires up a `tracing-subscriber` once per test binary so
//! structural events from the tree (enabled with `--features tracing`) show
//! up in test output. Filter with `RUST_LOG`, e.g.
//! `RUST_LOG=bplustree=trace`.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize the tracing subscriber. Safe to call from every test; only
/// the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .with_test_writer()
            .try_init();
    });
}
