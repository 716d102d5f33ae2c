use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "indicator_hub=info";

/// Initializes console logging for the binaries.
///
/// `RUST_LOG` wins over the default filter; `verbose` bumps the crate to debug.
/// Logs go to stderr so JSON printed on stdout stays machine-readable.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "indicator_hub=debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
