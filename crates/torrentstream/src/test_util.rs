//! Shared test-only helpers.

pub(crate) fn setup_test_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug,torrentstream=trace");
    }
    let _ = tracing_subscriber::fmt::try_init();
}
