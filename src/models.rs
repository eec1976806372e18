use serde::Serialize;
use time::OffsetDateTime;

/// Measured values of one LOOP packet, already converted to the configured units.
/// Sensors that are not installed or not reporting are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub pressure: Option<f64>,
    pub temperature_in: Option<f64>,
    pub temperature_out: Option<f64>,
    pub humidity_in: Option<u8>,
    pub humidity_out: Option<u8>,
    pub wind: Option<f64>,
    pub wind_avg_10m: Option<f64>,
    pub wind_dir: Option<u16>,
    pub rain_rate: Option<f64>,
    pub rain_day: Option<f64>,
    pub uv: Option<f64>,
    pub solar_radiation: Option<u16>,
}

/// One timestamped snapshot taken from the station
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    #[serde(flatten)]
    pub conditions: CurrentConditions,
}

impl Reading {
    pub fn new(time: OffsetDateTime, conditions: CurrentConditions) -> Self {
        Self { time, conditions }
    }
}
