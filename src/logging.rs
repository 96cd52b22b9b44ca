//! Logging setup.
//!
//! The dispatch layer only emits `tracing` events; it never installs a
//! subscriber on its own. Binaries call [`init`] once at startup, or install
//! their own subscriber instead.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "h2_dispatch=info";

/// Installs a process-wide fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Returns `false` if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_noop() {
        let _ = init(DEFAULT_DIRECTIVE);
        assert!(!init(DEFAULT_DIRECTIVE));
    }
}
