/// Measurement units and conversions from the station's native units
///
/// The Vantage console reports temperatures in °F, pressure in inHg, wind in mph and
/// rain as collector clicks. Everything is converted to the configured units before a
/// reading leaves the device adapter.
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnit {
    Hpa,
    InHg,
    MmHg,
    Mb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainUnit {
    Mm,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindUnit {
    KmH,
    Mph,
    FtS,
    Knots,
    Beaufort,
    MS,
}

/// Size of a single tip of the rain collector bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainCollectorSize {
    Inch001,
    Mm02,
    Mm01,
}

/// The four independently chosen unit kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Units {
    pub temperature: TemperatureUnit,
    pub pressure: PressureUnit,
    pub rain: RainUnit,
    pub wind: WindUnit,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            temperature: TemperatureUnit::Fahrenheit,
            pressure: PressureUnit::InHg,
            rain: RainUnit::In,
            wind: WindUnit::Mph,
        }
    }
}

// Beaufort scale upper bounds in mph
const BEAUFORT_LIMITS_MPH: [f64; 12] = [
    1.0, 3.0, 7.0, 12.0, 18.0, 24.0, 31.0, 38.0, 46.0, 54.0, 63.0, 72.0,
];

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl TemperatureUnit {
    pub fn from_fahrenheit(self, fahrenheit: f64) -> f64 {
        match self {
            TemperatureUnit::Fahrenheit => round_to(fahrenheit, 1),
            TemperatureUnit::Celsius => round_to((fahrenheit - 32.0) * 5.0 / 9.0, 1),
        }
    }
}

impl PressureUnit {
    pub fn from_inhg(self, inhg: f64) -> f64 {
        match self {
            PressureUnit::InHg => round_to(inhg, 3),
            PressureUnit::Hpa | PressureUnit::Mb => round_to(inhg * 33.863_886, 1),
            PressureUnit::MmHg => round_to(inhg * 25.4, 1),
        }
    }
}

impl RainUnit {
    pub fn from_inches(self, inches: f64) -> f64 {
        match self {
            RainUnit::In => round_to(inches, 2),
            RainUnit::Mm => round_to(inches * 25.4, 1),
        }
    }

    pub fn from_mm(self, mm: f64) -> f64 {
        match self {
            RainUnit::Mm => round_to(mm, 1),
            RainUnit::In => round_to(mm / 25.4, 2),
        }
    }
}

impl WindUnit {
    pub fn from_mph(self, mph: f64) -> f64 {
        match self {
            WindUnit::Mph => round_to(mph, 1),
            WindUnit::KmH => round_to(mph * 1.609_344, 1),
            WindUnit::MS => round_to(mph * 0.447_04, 1),
            WindUnit::FtS => round_to(mph * 1.466_667, 1),
            WindUnit::Knots => round_to(mph * 0.868_976, 1),
            WindUnit::Beaufort => BEAUFORT_LIMITS_MPH
                .iter()
                .position(|limit| mph < *limit)
                .unwrap_or(BEAUFORT_LIMITS_MPH.len()) as f64,
        }
    }
}

impl RainCollectorSize {
    /// Convert a number of bucket tips into the requested rain unit
    pub fn clicks_to(self, clicks: f64, unit: RainUnit) -> f64 {
        match self {
            RainCollectorSize::Inch001 => unit.from_inches(clicks * 0.01),
            RainCollectorSize::Mm02 => unit.from_mm(clicks * 0.2),
            RainCollectorSize::Mm01 => unit.from_mm(clicks * 0.1),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "°C" | "C" | "c" => Ok(TemperatureUnit::Celsius),
            "°F" | "F" | "f" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!("unknown temperature unit `{}`", other)),
        }
    }
}

impl FromStr for PressureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hpa" => Ok(PressureUnit::Hpa),
            "inhg" => Ok(PressureUnit::InHg),
            "mmhg" => Ok(PressureUnit::MmHg),
            "mb" => Ok(PressureUnit::Mb),
            _ => Err(format!("unknown pressure unit `{}`", s)),
        }
    }
}

impl FromStr for RainUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mm" => Ok(RainUnit::Mm),
            "in" => Ok(RainUnit::In),
            _ => Err(format!("unknown rain unit `{}`", s)),
        }
    }
}

impl FromStr for WindUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "km/h" | "kmh" => Ok(WindUnit::KmH),
            "mph" => Ok(WindUnit::Mph),
            "ft/s" | "fts" => Ok(WindUnit::FtS),
            "knots" | "kn" => Ok(WindUnit::Knots),
            "bft" | "beaufort" => Ok(WindUnit::Beaufort),
            "m/s" | "ms" => Ok(WindUnit::MS),
            _ => Err(format!("unknown wind unit `{}`", s)),
        }
    }
}

impl FromStr for RainCollectorSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.01in" => Ok(RainCollectorSize::Inch001),
            "0.2mm" => Ok(RainCollectorSize::Mm02),
            "0.1mm" => Ok(RainCollectorSize::Mm01),
            other => Err(format!(
                "unknown rain collector size `{}` (expected 0.01in, 0.2mm or 0.1mm)",
                other
            )),
        }
    }
}

impl fmt::Display for RainCollectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RainCollectorSize::Inch001 => "0.01in",
            RainCollectorSize::Mm02 => "0.2mm",
            RainCollectorSize::Mm01 => "0.1mm",
        })
    }
}
