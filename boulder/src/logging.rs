//! Development-time tracing.
//!
//! Diagnostics only, via `RUST_LOG` to stderr. The product output of the
//! engine is the state file under `.boulder/` and the delivered directives,
//! which are unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`. Compact format on stderr so stdout
/// stays clean for directives.
///
/// # Example
/// ```bash
/// RUST_LOG=boulder=debug boulder idle ses-1
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
