// Tracing setup. Progress for humans goes to stdout via `println!`; tracing
// output is diagnostics only and goes to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber. Fails if one is already installed.
pub fn init() -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(env_filter)
        .try_init()
}
