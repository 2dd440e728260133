//! Configuration error types.

use thiserror::Error;

/// Errors raised while reading configuration or parsing address rules.
///
/// Range-rule errors are recovered by the firewall (the rule is skipped);
/// errors from the top-level config file abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CIDR '{0}': missing '/' separator")]
    MissingSeparator(String),

    #[error("invalid CIDR '{cidr}': prefix '{prefix}' is not a number")]
    InvalidPrefix { cidr: String, prefix: String },

    #[error("invalid CIDR '{cidr}': prefix {prefix} outside 0..=32")]
    PrefixOutOfRange { cidr: String, prefix: i64 },

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
