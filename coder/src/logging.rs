//! Diagnostic tracing for the coder binary.
//!
//! Output goes to stderr so stdout stays reserved for the conversation.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset. Token usage is logged at
/// `info`, so `RUST_LOG=coder=info` shows it.
///
/// # Example
/// ```bash
/// RUST_LOG=coder=debug cargo run -- ./my-project
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
