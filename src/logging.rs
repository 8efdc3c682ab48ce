//! Tracing setup shared by the groundlink binaries.
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Log lines go to stderr so record output on stdout stays
/// machine-readable. `RUST_LOG` overrides the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
