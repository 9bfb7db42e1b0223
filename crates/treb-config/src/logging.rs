//! Structured logging init, the same `tracing`/`EnvFilter` pattern `anvil`/`forge` use for
//! their CLI entry points: `RUST_LOG` (or `TREB_LOG`) controls verbosity, defaulting to `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("TREB_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
