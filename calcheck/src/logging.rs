//! Diagnostics for the calcheck binary.
//!
//! Output goes to stderr and never mixes with the command results printed on
//! stdout. `RUST_LOG` wins over the `-v` flags when both are given.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,calcheck=info",
        _ => "warn,calcheck=debug",
    }
}

/// Install the stderr subscriber.
///
/// ```bash
/// RUST_LOG=calcheck=debug calcheck step session.json advance
/// calcheck -vv summary session.json
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
