use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Defines what the config file should contain.
///
/// Every field is optional in the file; omitted fields take the values of
/// [Config::default].
///
/// ```json5
/// {
///     min_consecutive_matches: 5,
///     activation_threshold: 50.0,
///     deactivation_threshold: 20.0,
///     min_deactivation_time_ms: 1000,
///     max_deactivation_time_ms: 5000,
///     max_distance: 100.0,
///     max_tentative_time_ms: 60000,
/// }
/// ```
pub struct Config {
    /// Number of consecutive matches required before activation is even considered.
    pub min_consecutive_matches: u32,
    /// The activation metric must reach this value for a track to become active.
    pub activation_threshold: f64,
    /// An active track whose deactivation metric drops below this value is evicted.
    pub deactivation_threshold: f64,
    /// Grace period in milliseconds after the last detection before decay begins.
    pub min_deactivation_time_ms: u64,
    /// Time in milliseconds at which decay reaches zero. Tracks unseen for
    /// longer than this are pruned.
    pub max_deactivation_time_ms: u64,
    /// The maximum center-to-center pixel distance for a detection to match a track.
    pub max_distance: f64,
    /// Tentative tracks older than this (since creation) are pruned even if
    /// they are still detected. `None` keeps them indefinitely.
    pub max_tentative_time_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_consecutive_matches: 5,
            activation_threshold: 50.0,
            deactivation_threshold: 20.0,
            min_deactivation_time_ms: 1000,
            max_deactivation_time_ms: 5000,
            max_distance: 100.0,
            max_tentative_time_ms: Some(60_000),
        }
    }
}

impl Config {
    /// Parse a JSON5 document and validate the result.
    pub fn from_json5_str(text: &str) -> Result<Self> {
        let config: Config = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON5 config file.
    pub fn from_json5_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json5_str(&text)
    }

    /// Check the ordering and range constraints between the parameters.
    pub fn validate(&self) -> Result<()> {
        let Config {
            min_consecutive_matches,
            activation_threshold,
            deactivation_threshold,
            min_deactivation_time_ms,
            max_deactivation_time_ms,
            max_distance,
            max_tentative_time_ms,
        } = *self;

        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if min_consecutive_matches == 0 {
            return invalid("min_consecutive_matches must be at least 1".into());
        }
        for (name, value) in [
            ("activation_threshold", activation_threshold),
            ("deactivation_threshold", deactivation_threshold),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 100], got {value}"));
            }
        }
        if min_deactivation_time_ms >= max_deactivation_time_ms {
            return invalid(format!(
                "min_deactivation_time_ms ({min_deactivation_time_ms}) must be less than \
                 max_deactivation_time_ms ({max_deactivation_time_ms})"
            ));
        }
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return invalid(format!("max_distance must be positive, got {max_distance}"));
        }
        if max_tentative_time_ms == Some(0) {
            return invalid("max_tentative_time_ms must be positive when set".into());
        }
        Ok(())
    }

    pub(crate) fn deactivation_window_ms(&self) -> f64 {
        (self.max_deactivation_time_ms - self.min_deactivation_time_ms) as f64
    }
}
