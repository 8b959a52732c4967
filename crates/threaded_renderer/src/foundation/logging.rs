//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `filter` follows the `env_logger` filter syntax. `RUST_LOG`, when set,
/// takes precedence. Subsequent calls are ignored, so tests and binaries can
/// both call this safely.
pub fn init(filter: &str) {
    let mut builder = env_logger::Builder::new();

    match std::env::var("RUST_LOG") {
        Ok(env_filter) => builder.parse_filters(&env_filter),
        Err(_) => builder.parse_filters(filter),
    };

    if builder.try_init().is_ok() {
        log::debug!("logging initialized");
    }
}
