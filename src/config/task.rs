/// Configuration of the recurring current-conditions task
use log::warn;
use std::time::Duration;

use super::environment::{self, EnvSource, Overlay};
use crate::error::ConfigurationError;

pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Longest accepted interval: one year
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Caller-supplied task settings
#[derive(Debug, Clone, Default)]
pub struct TaskOverrides {
    /// Interval in seconds. Fractional, non-positive or over-long values are rejected.
    pub interval: Option<f64>,
    /// Overlay the interval (and the enable toggle) from the environment
    pub use_environment: bool,
}

impl TaskOverrides {
    pub fn every(seconds: f64) -> Self {
        Self {
            interval: Some(seconds),
            use_environment: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfiguration {
    pub interval_secs: u64,
}

impl TaskConfiguration {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn whole_seconds(value: f64) -> Option<u64> {
    if value.is_finite()
        && value >= 1.0
        && value <= MAX_INTERVAL_SECS as f64
        && value.fract() == 0.0
    {
        Some(value as u64)
    } else {
        None
    }
}

fn parse_interval(value: &str) -> Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    whole_seconds(parsed)
        .map(|_| parsed)
        .ok_or_else(|| {
            format!(
                "`{}` is not a whole number of seconds between 1 and {}",
                value, MAX_INTERVAL_SECS
            )
        })
}

/// Resolve the task configuration.
///
/// `None` is the disable signal: the task is removed without any validation. With the
/// environment overlay enabled, `RECORDER_CURRENT_CONDITIONS_ENABLED=false` disables the
/// task the same way.
///
/// # Arguments
/// * `settings` - Task settings, or `None` to disable the task
/// * `env` - Environment source used when `settings.use_environment` is set
///
/// # Returns
/// The task configuration, `Ok(None)` when disabled, or the validation error
pub fn resolve_task(
    settings: Option<TaskOverrides>,
    env: EnvSource<'_>,
) -> Result<Option<TaskConfiguration>, ConfigurationError> {
    let settings = match settings {
        Some(settings) => settings,
        None => return Ok(None),
    };

    let mut interval = settings.interval.unwrap_or(DEFAULT_INTERVAL_SECS as f64);

    if settings.use_environment {
        let mut overlay = Overlay::new(env);
        let enabled = overlay.read(
            environment::CURRENT_CONDITIONS_ENABLED,
            environment::parse_bool,
        );
        if enabled == Some(false) {
            return Ok(None);
        }
        overlay.apply(
            environment::CURRENT_CONDITIONS_INTERVAL,
            &mut interval,
            parse_interval,
        );
        for warning in overlay.into_warnings() {
            warn!("{}", warning);
        }
    }

    let interval_secs =
        whole_seconds(interval).ok_or_else(|| ConfigurationError::InvalidInterval {
            value: interval.to_string(),
        })?;

    Ok(Some(TaskConfiguration { interval_secs }))
}
