//! Logging initialisation
//!
//! The engine logs through the `log` facade; binaries pick the backend. These
//! helpers install `env_logger`, honouring `RUST_LOG` when it is set.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system with the `info` default filter
pub fn init() {
    init_with_level("info");
}

/// Initialize the logging system, falling back to `level` when `RUST_LOG` is unset.
///
/// Calling it more than once is harmless; only the first call installs a logger.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
