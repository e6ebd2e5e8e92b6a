use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// RUST_LOG wins when present; otherwise `default_level` applies to the
/// whole process.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
