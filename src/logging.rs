use tracing_subscriber::{EnvFilter, fmt};

/// Install the global fmt subscriber, writing to stderr.
///
/// `filter` is used when `RUST_LOG` is unset, e.g. `info` or `rams_workload=debug`.
pub fn init(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Debug-level subscriber routed through the test harness' captured output.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
