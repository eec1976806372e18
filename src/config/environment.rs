/// Environment variable overlay for the recorder configuration
use url::Url;

pub const API: &str = "RECORDER_API";
pub const API_KEY: &str = "RECORDER_API_KEY";
pub const BAUD_RATE: &str = "RECORDER_BAUD_RATE";
pub const MODEL: &str = "RECORDER_MODEL";
pub const SERIAL_PATH: &str = "RECORDER_SERIAL_PATH";
pub const LOG_LEVEL: &str = "RECORDER_LOG_LEVEL";
pub const RAIN_COLLECTOR_SIZE: &str = "RECORDER_RAIN_COLLECTOR_SIZE";
pub const TEMPERATURE_UNIT: &str = "RECORDER_TEMPERATURE_UNIT";
pub const PRESSURE_UNIT: &str = "RECORDER_PRESSURE_UNIT";
pub const RAIN_UNIT: &str = "RECORDER_RAIN_UNIT";
pub const WIND_UNIT: &str = "RECORDER_WIND_UNIT";
pub const LOG_TO_CONSOLE: &str = "RECORDER_LOG_TO_CONSOLE";
pub const LOG_TO_FILE: &str = "RECORDER_LOG_TO_FILE";
pub const CURRENT_CONDITIONS_INTERVAL: &str = "RECORDER_CURRENT_CONDITIONS_INTERVAL";
pub const CURRENT_CONDITIONS_ENABLED: &str = "RECORDER_CURRENT_CONDITIONS_ENABLED";

/// Source of environment values, injectable so resolution can be tested without
/// touching the process environment.
pub type EnvSource<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a variable from the process environment (after `.env` has been loaded)
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Collects overlay values and the warnings produced while reading them.
///
/// Every variable is optional and validated on its own. A variable that is missing or
/// fails validation leaves the previous value in place and is recorded as a warning.
pub(crate) struct Overlay<'a> {
    source: EnvSource<'a>,
    warnings: Vec<String>,
}

impl<'a> Overlay<'a> {
    pub(crate) fn new(source: EnvSource<'a>) -> Self {
        Self {
            source,
            warnings: Vec::new(),
        }
    }

    /// Read and validate one variable, returning `None` (with a warning) when it is
    /// absent or invalid.
    pub(crate) fn read<T, F>(&mut self, name: &str, parse: F) -> Option<T>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        let raw = match (self.source)(name) {
            Some(raw) => raw,
            None => {
                self.warnings
                    .push(format!("{} is not set, keeping previous value", name));
                return None;
            }
        };

        match parse(raw.trim()) {
            Ok(value) => Some(value),
            Err(reason) => {
                self.warnings
                    .push(format!("Ignoring {}={:?}: {}", name, raw, reason));
                None
            }
        }
    }

    /// Overwrite `target` only if the variable is present and valid
    pub(crate) fn apply<T, F>(&mut self, name: &str, target: &mut T, parse: F)
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        if let Some(value) = self.read(name, parse) {
            *target = value;
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

/// Parse boolean-like strings ("true"/"false", "1"/"0", "yes"/"no", "on"/"off")
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(format!("`{}` is not a boolean", value)),
    }
}

/// Values that must not be blank, e.g. the serial path
pub fn parse_non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("value is empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// The collector endpoint must be an absolute http(s) URL
pub fn parse_api(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(value.to_string()),
        scheme => Err(format!("unsupported scheme `{}`", scheme)),
    }
}
