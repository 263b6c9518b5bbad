use std::env;

use crate::error::ConfigError;
use crate::loader::LoaderOptions;

/// Loader defaults loaded from environment variables.
///
/// - `SYNCLOAD_MAX_BATCH_SIZE`: keys per batch call, unset for unbounded
/// - `SYNCLOAD_CACHE`: key deduplication, default `true`
/// - `SYNCLOAD_MAX_DRAIN_PASSES`: drain loop bound, unset for unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub max_batch_size: Option<usize>,
    pub cache: bool,
    pub max_drain_passes: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            cache: true,
            max_drain_passes: None,
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            max_batch_size: var("SYNCLOAD_MAX_BATCH_SIZE")
                .map(|value| parse_count("SYNCLOAD_MAX_BATCH_SIZE", &value))
                .transpose()?,
            cache: var("SYNCLOAD_CACHE")
                .map(|value| parse_flag("SYNCLOAD_CACHE", &value))
                .transpose()?
                .unwrap_or(defaults.cache),
            max_drain_passes: var("SYNCLOAD_MAX_DRAIN_PASSES")
                .map(|value| parse_count("SYNCLOAD_MAX_DRAIN_PASSES", &value))
                .transpose()?,
        })
    }

    /// Options for a loader named `name` using these defaults.
    pub fn options(&self, name: impl Into<String>) -> LoaderOptions {
        LoaderOptions {
            name: Some(name.into()),
            max_batch_size: self.max_batch_size,
            cache: self.cache,
        }
    }
}

fn parse_count(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}
