//! Logger initialization.

use log::LevelFilter;

use crate::error_handling::InitializationError;

/// Initializes the logger at the given level.
///
/// Configures `env_logger` from the default environment first, so
/// `RUST_LOG=provider_throttle=debug` style filtering keeps working; the
/// explicit `level` then takes precedence for everything unfiltered. Noisy
/// HTTP internals are pinned to info.
///
/// # Errors
///
/// Returns [`InitializationError::LoggerError`] if a logger was already
/// installed (the host application may own logging; in that case skip this).
pub fn init_logger(level: LevelFilter) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.try_init()?;
    Ok(())
}
