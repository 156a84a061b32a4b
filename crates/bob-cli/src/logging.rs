//! stderr logging whose level follows `--debug`.
//!
//! The level is first set from the bootstrap parse. `--debug` given after a
//! subcommand is only seen by the full parse, so the filter sits behind a
//! reload layer and is swapped once the final value is known.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle to the installed log filter.
#[derive(Debug, Clone)]
pub struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl Logging {
    /// Install the global subscriber. Call once per process.
    pub fn init(debug: bool) -> Self {
        let (filter, handle) = reload::Layer::new(filter(debug));
        // stdout carries help output; logs go to stderr.
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
        Self { handle }
    }

    pub fn set_debug(&self, debug: bool) {
        if let Err(e) = self.handle.reload(filter(debug)) {
            eprintln!("warning: failed to change log level: {e}");
        }
    }
}

/// `RUST_LOG` directives plus the level implied by `--debug`.
fn filter(debug: bool) -> EnvFilter {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    EnvFilter::from_default_env().add_directive(level.into())
}

