//! Dev logging on top of `tracing`.

use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub use tracing as __tracing;

/// Install the process-wide subscriber. `RUST_LOG` wins when set; otherwise
/// debug builds show dev logs and release builds only warnings.
pub fn init() {
    let default_filter = if cfg!(debug_assertions) { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Stdout carries the summaries and CSV rows, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[macro_export]
macro_rules! log_dev {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::logging::__tracing::debug!($($arg)*);
        }
    };
}
