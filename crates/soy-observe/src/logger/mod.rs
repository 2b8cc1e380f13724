mod config;
mod error;
mod install;
mod level;

pub use config::{LoggerConfig, LoggerFormat};
pub use error::{LoggerError, LoggerResult};
pub use level::LoggerLevel;

/// Installs the global tracing subscriber described by `cfg`.
///
/// Must be called once, before the first `tracing` macro that should be
/// captured. A second call returns [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use soy_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).expect("logger");
/// tracing::info!("controller starting");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => install::text(cfg),
        LoggerFormat::Json => install::json(cfg),
        LoggerFormat::Journald => install::journald(cfg),
    }
}
