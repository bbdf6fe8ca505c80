use std::time::Duration;

use crate::error::ConfigError;
use crate::interface::ResolvedOptions;

/// Option field the interface declares for the save interval.
pub const FREQUENCY_FIELD: &str = "autosave_frequency";

/// Interval used when the host supplies no value for [`FREQUENCY_FIELD`].
pub const DEFAULT_FREQUENCY_MS: u64 = 1000;

/// Validated autosave settings. A value of this type always has a positive
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    frequency: Duration,
}

impl AutosaveConfig {
    pub fn from_millis(frequency_ms: i64) -> Result<Self, ConfigError> {
        if frequency_ms <= 0 {
            return Err(ConfigError::invalid(
                FREQUENCY_FIELD,
                format!("must be a positive number of milliseconds, got {frequency_ms}"),
            ));
        }

        Ok(Self {
            frequency: Duration::from_millis(frequency_ms as u64),
        })
    }

    /// Read the interval from host-supplied option values.
    pub fn from_options(options: &ResolvedOptions) -> Result<Self, ConfigError> {
        match options.integer(FREQUENCY_FIELD) {
            Some(ms) => Self::from_millis(ms),
            None => Ok(Self::default()),
        }
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn frequency_ms(&self) -> u128 {
        self.frequency.as_millis()
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            frequency: Duration::from_millis(DEFAULT_FREQUENCY_MS),
        }
    }
}
