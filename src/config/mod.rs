pub mod environment;
pub mod task;

use log::{info, LevelFilter};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

use crate::error::ConfigurationError;
use crate::units::{PressureUnit, RainCollectorSize, RainUnit, TemperatureUnit, Units, WindUnit};
use environment::{EnvSource, Overlay};

pub use task::{
    resolve_task, TaskConfiguration, TaskOverrides, DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS,
};

const DEFAULT_LOG_FILE: &str = "logs/recorder.log";

/// Supported weather station models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Pro2,
    Vue,
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pro2" => Ok(Model::Pro2),
            "vue" => Ok(Model::Vue),
            _ => Err(format!("unknown weather station model `{}`", s)),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Model::Pro2 => "Pro2",
            Model::Vue => "Vue",
        })
    }
}

/// Baud rates the Vantage console can be configured to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B1200 = 1200,
    B2400 = 2400,
    B4800 = 4800,
    B9600 = 9600,
    B14400 = 14400,
    B19200 = 19200,
}

impl BaudRate {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1200 => Ok(BaudRate::B1200),
            2400 => Ok(BaudRate::B2400),
            4800 => Ok(BaudRate::B4800),
            9600 => Ok(BaudRate::B9600),
            14400 => Ok(BaudRate::B14400),
            19200 => Ok(BaudRate::B19200),
            other => Err(format!("unsupported baud rate {}", other)),
        }
    }
}

impl FromStr for BaudRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .parse()
            .map_err(|_| format!("`{}` is not a baud rate", s))?;
        BaudRate::try_from(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: LevelFilter,
    pub console: bool,
    pub file: bool,
    pub file_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            console: true,
            file: false,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Fully resolved recorder configuration, immutable once the recorder owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub api: Url,
    pub api_key: String,
    pub model: Model,
    pub path: String,
    pub baud_rate: BaudRate,
    pub units: Units,
    pub rain_collector_size: RainCollectorSize,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default)]
pub struct UnitOverrides {
    pub temperature: Option<TemperatureUnit>,
    pub pressure: Option<PressureUnit>,
    pub rain: Option<RainUnit>,
    pub wind: Option<WindUnit>,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingOverrides {
    pub level: Option<LevelFilter>,
    pub console: Option<bool>,
    pub file: Option<bool>,
    pub file_path: Option<PathBuf>,
}

/// Override of a field that has a default value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override<T> {
    /// Keep the default
    Keep,
    Set(T),
    /// Remove the default, leaving the field unset
    Clear,
}

impl<T> Default for Override<T> {
    fn default() -> Self {
        Override::Keep
    }
}

impl<T> Override<T> {
    fn merge_into(self, field: &mut Option<T>) {
        match self {
            Override::Keep => {}
            Override::Set(value) => *field = Some(value),
            Override::Clear => *field = None,
        }
    }
}

/// Caller-supplied partial configuration. Every `Some` leaf replaces the default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api: Option<String>,
    pub api_key: Option<String>,
    pub model: Override<Model>,
    pub path: Option<String>,
    pub baud_rate: Override<BaudRate>,
    pub units: UnitOverrides,
    pub rain_collector_size: Option<RainCollectorSize>,
    pub logging: LoggingOverrides,
}

/// Result of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: Configuration,
    /// Environment variables that were absent or rejected
    pub warnings: Vec<String>,
}

// Configuration while it is still being merged; required fields may be missing.
#[derive(Debug, Clone)]
struct Draft {
    api: Option<String>,
    api_key: String,
    model: Option<Model>,
    path: Option<String>,
    baud_rate: Option<BaudRate>,
    units: Units,
    rain_collector_size: Option<RainCollectorSize>,
    logging: LoggingConfig,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            api: None,
            api_key: String::new(),
            model: Some(Model::Pro2),
            path: None,
            baud_rate: Some(BaudRate::B19200),
            units: Units::default(),
            rain_collector_size: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Draft {
    fn merge(&mut self, overrides: ConfigOverrides) {
        if let Some(api) = overrides.api {
            self.api = Some(api);
        }
        if let Some(api_key) = overrides.api_key {
            self.api_key = api_key;
        }
        overrides.model.merge_into(&mut self.model);
        if let Some(path) = overrides.path {
            self.path = Some(path);
        }
        overrides.baud_rate.merge_into(&mut self.baud_rate);
        if let Some(size) = overrides.rain_collector_size {
            self.rain_collector_size = Some(size);
        }

        let units = overrides.units;
        self.units.temperature = units.temperature.unwrap_or(self.units.temperature);
        self.units.pressure = units.pressure.unwrap_or(self.units.pressure);
        self.units.rain = units.rain.unwrap_or(self.units.rain);
        self.units.wind = units.wind.unwrap_or(self.units.wind);

        let logging = overrides.logging;
        self.logging.level = logging.level.unwrap_or(self.logging.level);
        self.logging.console = logging.console.unwrap_or(self.logging.console);
        self.logging.file = logging.file.unwrap_or(self.logging.file);
        if let Some(file_path) = logging.file_path {
            self.logging.file_path = file_path;
        }
    }

    fn overlay(&mut self, overlay: &mut Overlay<'_>) {
        if let Some(api) = overlay.read(environment::API, environment::parse_api) {
            self.api = Some(api);
        }
        overlay.apply(environment::API_KEY, &mut self.api_key, |v| Ok(v.to_string()));
        if let Some(baud_rate) = overlay.read(environment::BAUD_RATE, BaudRate::from_str) {
            self.baud_rate = Some(baud_rate);
        }
        if let Some(model) = overlay.read(environment::MODEL, Model::from_str) {
            self.model = Some(model);
        }
        if let Some(path) = overlay.read(environment::SERIAL_PATH, environment::parse_non_empty)
        {
            self.path = Some(path);
        }
        overlay.apply(environment::LOG_LEVEL, &mut self.logging.level, |v| {
            LevelFilter::from_str(v).map_err(|_| format!("unknown log level `{}`", v))
        });
        if let Some(size) = overlay.read(
            environment::RAIN_COLLECTOR_SIZE,
            RainCollectorSize::from_str,
        ) {
            self.rain_collector_size = Some(size);
        }
        overlay.apply(
            environment::TEMPERATURE_UNIT,
            &mut self.units.temperature,
            TemperatureUnit::from_str,
        );
        overlay.apply(
            environment::PRESSURE_UNIT,
            &mut self.units.pressure,
            PressureUnit::from_str,
        );
        overlay.apply(environment::RAIN_UNIT, &mut self.units.rain, RainUnit::from_str);
        overlay.apply(environment::WIND_UNIT, &mut self.units.wind, WindUnit::from_str);
        overlay.apply(
            environment::LOG_TO_CONSOLE,
            &mut self.logging.console,
            environment::parse_bool,
        );
        overlay.apply(
            environment::LOG_TO_FILE,
            &mut self.logging.file,
            environment::parse_bool,
        );
    }

    /// Check required fields in a fixed order, stopping at the first missing one
    fn validate(self) -> Result<Configuration, ConfigurationError> {
        let path = self
            .path
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigurationError::MissingSerialPath)?;
        let rain_collector_size = self
            .rain_collector_size
            .ok_or(ConfigurationError::MissingRainCollectorSize)?;
        let api = self
            .api
            .filter(|a| !a.trim().is_empty())
            .ok_or(ConfigurationError::MissingApi)?;
        let baud_rate = self.baud_rate.ok_or(ConfigurationError::MissingBaudRate)?;
        let model = self.model.ok_or(ConfigurationError::MissingModel)?;

        let api = environment::parse_api(&api)
            .and_then(|a| Url::parse(&a).map_err(|e| e.to_string()))
            .map_err(|reason| ConfigurationError::InvalidApi {
                url: api.clone(),
                reason,
            })?;

        Ok(Configuration {
            api,
            api_key: self.api_key,
            model,
            path,
            baud_rate,
            units: self.units,
            rain_collector_size,
            logging: self.logging,
        })
    }
}

/// Merges defaults, explicit overrides and (optionally) environment variables into a
/// validated [`Configuration`].
pub struct ConfigResolver<'a> {
    overrides: ConfigOverrides,
    environment: Option<EnvSource<'a>>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self {
            overrides,
            environment: None,
        }
    }

    /// Enable the environment overlay, reading values from `source`
    pub fn with_environment(mut self, source: EnvSource<'a>) -> Self {
        self.environment = Some(source);
        self
    }

    pub fn resolve(self) -> Result<Resolution, ConfigurationError> {
        let mut draft = Draft::default();
        draft.merge(self.overrides);

        let mut warnings = Vec::new();
        if let Some(source) = self.environment {
            let mut overlay = Overlay::new(source);
            draft.overlay(&mut overlay);
            warnings = overlay.into_warnings();
        }

        let config = draft.validate()?;
        Ok(Resolution { config, warnings })
    }
}

/// Resolve the recorder configuration, reading `.env` and the process environment
/// when `use_environment` is set. Overlay warnings are logged.
pub fn resolve(
    overrides: ConfigOverrides,
    use_environment: bool,
) -> Result<Configuration, ConfigurationError> {
    let resolver = ConfigResolver::new(overrides);
    let resolution = if use_environment {
        dotenv::dotenv().ok();
        resolver.with_environment(&environment::process_env).resolve()?
    } else {
        resolver.resolve()?
    };

    for warning in &resolution.warnings {
        log::warn!("{}", warning);
    }
    info!(
        "Configuration resolved: {} station on {} @ {} baud, collector {}",
        resolution.config.model,
        resolution.config.path,
        resolution.config.baud_rate.as_u32(),
        resolution.config.api
    );
    Ok(resolution.config)
}
