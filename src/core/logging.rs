//! Logging setup
//!
//! Library code only emits `log` records; binaries and tests pick the sink.

/// Initialize env_logger with an `info` default, overridable via RUST_LOG.
///
/// Safe to call more than once; later calls are ignored.
///
/// # Example
/// ```
/// terrastream::core::logging::init();
/// log::info!("streaming started");
/// ```
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Test-friendly logger: output is captured by the test harness
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
