//! Tracing subscriber setup for binaries embedding the client.

use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigError, LoggingConfig};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `config.level`. Returns `Ok(false)` when a global
/// subscriber was already installed, so calling this twice is harmless.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if `config.level` is not a valid filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Invalid(format!("Invalid log level: {e}")))?;

    let installed = if config.json {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .json();
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_a_no_op() {
        let config = LoggingConfig::default();
        let first = init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap() || !first);
    }
}
