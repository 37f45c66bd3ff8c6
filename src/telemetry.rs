//! Tracing subscriber setup for embedders and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{GraphRecordError, Result};

/// Installs a global `fmt` subscriber filtered by `directives`
/// (e.g. `"graph_record=debug"`).
///
/// Fails if the directives do not parse or a subscriber is already set.
pub fn init_tracing(directives: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directives)
        .map_err(|e| GraphRecordError::InputError(format!("Invalid log filter: {e}")))?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| GraphRecordError::InputError("Logging already initialized".into()))
}

/// Like [`init_tracing`], reading directives from `RUST_LOG` and falling
/// back to `default` when it is unset or invalid. Later calls are no-ops.
pub fn init_tracing_from_env(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_directives() {
        assert!(init_tracing("graph_record=notalevel[").is_err());
    }
}
