//! Tracing subscriber setup.
//!
//! The crate only emits `tracing` events; installing a subscriber is left to
//! the application. [`init_tracing`] is a convenience for binaries and
//! tests:
//!
//! ```bash
//! # Invocation counts and fired timeouts
//! RUST_LOG=closer=debug cargo test
//!
//! # Everything, including per-invocation failure counts
//! RUST_LOG=closer=trace cargo test
//! ```

use tracing_subscriber::EnvFilter;

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Returns false if a global
/// subscriber was already installed, so repeated calls are harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        assert!(!init_tracing());
    }
}
