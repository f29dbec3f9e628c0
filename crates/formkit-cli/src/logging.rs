//! Log output
//!
//! Logs go to stderr so command output on stdout stays valid JSON.
//! `RUST_LOG` wins over the verbosity flag.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter, raised to `debug` by `--verbose`
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "formkit_cli=debug,formkit_pipeline=debug,formkit_schema=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber; a second call is a no-op
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
