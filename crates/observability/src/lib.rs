//! Process-wide tracing setup shared by the binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogConfig, LogFormat};

/// Initialize tracing with the default configuration (JSON, `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(&LogConfig::default());
}

/// Initialize tracing with an explicit configuration.
pub fn init_with(config: &LogConfig) {
    tracing::init(config);
}
