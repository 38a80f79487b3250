//! Helpers shared by the integration tests.

#![allow(dead_code)]

/// Routes `log` output through the test harness. `RUST_LOG=debug` shows the
/// compositor's resize and degradation messages next to a failing test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
