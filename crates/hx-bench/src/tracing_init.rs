use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing-subscriber` fmt layer for the e2e/bench test binaries,
/// and bridges any `log` records (third-party crates) into the same
/// subscriber via `tracing-log`. Safe to call from every test — installation
/// happens at most once per process.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        tracing_log::LogTracer::init().ok();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}
