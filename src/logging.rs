//! Tracing setup for the `fpipe` binary.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary (or the embedding application).

use std::env;
use tracing_subscriber::{prelude::*, EnvFilter, Layer};

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "FRONTPIPE_LOG";

/// Filter used when [`LOG_ENV`] is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,frontpipe=debug"
    } else {
        "warn,frontpipe=info"
    }
}

/// Install a stderr subscriber.
///
/// If `FRONTPIPE_LOG` is set it takes precedence over `verbose`. Calling this
/// twice is harmless; the second call is ignored.
pub fn init(verbose: bool) {
    let mut filter = EnvFilter::new(default_directive(verbose));
    if env::var(LOG_ENV).is_ok() {
        filter = EnvFilter::from_env(LOG_ENV);
    }

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
