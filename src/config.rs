//! Request logging configuration.
//!
//! Read once at startup and never changed afterwards.
//!
//! | Variable | Default |
//! |---|---|
//! | `LOUPE_HTTP_LOG_ENABLED` | `true` |
//! | `LOUPE_HTTP_LOG_MAX_BODY_LENGTH` | `2000` |

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Environment prefix for [`LogConfig::from_env`].
pub const ENV_PREFIX: &str = "LOUPE_HTTP_LOG_";

/// Settings for [`RequestLog`](crate::middleware::RequestLog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Master switch. When off, requests pass through untouched.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Longest body, in characters, written to a log line.
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_max_body_length() -> usize {
    2000
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_body_length: default_max_body_length(),
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `LOUPE_HTTP_LOG_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_body_length, 2000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{"max_body_length":10}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_body_length, 10);
    }

    #[test]
    fn env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("LOUPE_HTTP_LOG_ENABLED", "false");
            jail.set_env("LOUPE_HTTP_LOG_MAX_BODY_LENGTH", "512");
            let config = LogConfig::from_env().expect("config loads");
            assert!(!config.enabled);
            assert_eq!(config.max_body_length, 512);
            Ok(())
        });
    }

    #[test]
    fn empty_env_gives_defaults() {
        Jail::expect_with(|_jail| {
            assert_eq!(LogConfig::from_env().expect("config loads"), LogConfig::default());
            Ok(())
        });
    }

    #[test]
    fn malformed_env_is_a_config_error() {
        Jail::expect_with(|jail| {
            jail.set_env("LOUPE_HTTP_LOG_MAX_BODY_LENGTH", "lots");
            let err = LogConfig::from_env().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            Ok(())
        });
    }
}
