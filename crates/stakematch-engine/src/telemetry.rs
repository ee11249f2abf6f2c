//! `tracing-subscriber` setup for hosts embedding the engine.

use stakematch_types::{LoggingConfig, Result, StakematchError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. `RUST_LOG` wins over `config.filter`.
///
/// Returns `false` if a global subscriber was already installed (common in
/// tests); the existing one is left alone.
///
/// # Errors
/// Returns `Configuration` if the configured filter does not parse.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| StakematchError::Configuration(format!("log filter: {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
            .try_init()
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_rejected_when_env_unset() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "stakematch=loud".into(),
            json: false,
        };
        assert!(matches!(
            init(&config).unwrap_err(),
            StakematchError::Configuration(_)
        ));
    }

    #[test]
    fn second_init_is_harmless() {
        let config = LoggingConfig::default();
        let _ = init(&config).unwrap();
        assert!(!init(&config).unwrap());
    }
}
