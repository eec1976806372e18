/// Davis Vantage serial driver: wake-up handshake and LOOP packet decoding
use async_trait::async_trait;
use log::{debug, info};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

use super::{Device, DeviceConnector};
use crate::config::{Configuration, Model};
use crate::error::{ConnectionError, ReadError};
use crate::models::{CurrentConditions, Reading};
use crate::units::{RainCollectorSize, Units};

// Vantage serial protocol constants
const LOOP_PACKET_LEN: usize = 99;
const ACK: u8 = 0x06;
const WAKE_UP_ATTEMPTS: u32 = 3;
const PORT_TIMEOUT_MS: u64 = 1200;

// Values the console reports for sensors that are missing
const NO_TEMPERATURE: i16 = 32767;
const NO_BYTE: u8 = 255;
const NO_RAIN_RATE: u16 = 65535;
const NO_SOLAR: u16 = 32767;

/// Everything the decoder needs from the configuration
#[derive(Debug, Clone, Copy)]
pub struct DecodeSettings {
    pub model: Model,
    pub units: Units,
    pub rain_collector_size: RainCollectorSize,
}

impl From<&Configuration> for DecodeSettings {
    fn from(config: &Configuration) -> Self {
        Self {
            model: config.model,
            units: config.units,
            rain_collector_size: config.rain_collector_size,
        }
    }
}

/// CRC-16/XMODEM as used by the Vantage console. A packet including its trailing CRC
/// checksums to zero.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |mut crc, byte| {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn le_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Decode a LOOP packet into current conditions
///
/// Relevant layout of the 99-byte packet (little-endian):
/// - Bytes 0-2: "LOO"
/// - Bytes 7-8: Barometer (inHg / 1000)
/// - Bytes 9-10: Inside temperature (°F / 10)
/// - Byte 11: Inside humidity (%)
/// - Bytes 12-13: Outside temperature (°F / 10)
/// - Byte 14: Wind speed (mph)
/// - Byte 15: 10 minute average wind speed (mph)
/// - Bytes 16-17: Wind direction (degrees, 0 = no data)
/// - Byte 33: Outside humidity (%)
/// - Bytes 41-42: Rain rate (clicks / hour)
/// - Byte 43: UV index (/ 10)
/// - Bytes 44-45: Solar radiation (W/m²)
/// - Bytes 50-51: Day rain (clicks)
/// - Bytes 95-96: "\n\r"
/// - Bytes 97-98: CRC (big-endian)
///
/// # Arguments
/// * `packet` - Raw packet as received after the ACK
/// * `settings` - Model, units and rain collector calibration
///
/// # Returns
/// Decoded conditions, or an error if the packet is malformed or fails its CRC
pub fn decode_loop_packet(
    packet: &[u8],
    settings: &DecodeSettings,
) -> Result<CurrentConditions, ReadError> {
    if packet.len() != LOOP_PACKET_LEN {
        return Err(ReadError::MalformedPacket(format!(
            "expected {} bytes, got {}",
            LOOP_PACKET_LEN,
            packet.len()
        )));
    }
    if &packet[0..3] != b"LOO" || &packet[95..97] != b"\n\r" {
        return Err(ReadError::MalformedPacket("missing LOOP framing".to_string()));
    }
    if crc16(packet) != 0 {
        return Err(ReadError::Checksum);
    }

    let units = settings.units;
    let temperature = |offset: usize| {
        let raw = le_i16(packet, offset);
        (raw != NO_TEMPERATURE).then(|| units.temperature.from_fahrenheit(f64::from(raw) / 10.0))
    };
    let byte = |offset: usize| Some(packet[offset]).filter(|b| *b != NO_BYTE);

    let barometer = le_u16(packet, 7);
    let wind_dir = le_u16(packet, 16);
    let rain_rate = le_u16(packet, 41);
    let solar = le_u16(packet, 44);

    // The Vue has no UV or solar radiation sensors
    let has_solar_sensors = settings.model == Model::Pro2;

    Ok(CurrentConditions {
        pressure: (barometer != 0).then(|| units.pressure.from_inhg(f64::from(barometer) / 1000.0)),
        temperature_in: temperature(9),
        temperature_out: temperature(12),
        humidity_in: byte(11),
        humidity_out: byte(33),
        wind: byte(14).map(|mph| units.wind.from_mph(f64::from(mph))),
        wind_avg_10m: byte(15).map(|mph| units.wind.from_mph(f64::from(mph))),
        wind_dir: (1..=360).contains(&wind_dir).then_some(wind_dir),
        rain_rate: (rain_rate != NO_RAIN_RATE).then(|| {
            settings
                .rain_collector_size
                .clicks_to(f64::from(rain_rate), units.rain)
        }),
        rain_day: Some(
            settings
                .rain_collector_size
                .clicks_to(f64::from(le_u16(packet, 50)), units.rain),
        ),
        uv: byte(43)
            .filter(|_| has_solar_sensors)
            .map(|uv| f64::from(uv) / 10.0),
        solar_radiation: Some(solar).filter(|s| has_solar_sensors && *s != NO_SOLAR),
    })
}

/// Wake the console up; it answers a lone newline with "\n\r" once awake
fn wake_up(port: &mut dyn SerialPort) -> Result<(), ReadError> {
    for attempt in 1..=WAKE_UP_ATTEMPTS {
        port.clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::from)?;
        port.write_all(b"\n")?;

        let mut reply = [0u8; 2];
        match port.read_exact(&mut reply) {
            Ok(()) if &reply == b"\n\r" => return Ok(()),
            Ok(()) => debug!("Unexpected wake-up reply {:?}", reply),
            Err(e) => debug!("Wake-up attempt {} failed: {}", attempt, e),
        }
    }
    Err(ReadError::WakeUp(WAKE_UP_ATTEMPTS))
}

fn read_loop_packet(port: &mut dyn SerialPort) -> Result<[u8; LOOP_PACKET_LEN], ReadError> {
    wake_up(port)?;
    port.write_all(b"LOOP 1\n")?;

    let mut ack = [0u8; 1];
    port.read_exact(&mut ack)?;
    if ack[0] != ACK {
        return Err(ReadError::NotAcknowledged(ack[0]));
    }

    let mut packet = [0u8; LOOP_PACKET_LEN];
    port.read_exact(&mut packet)?;
    Ok(packet)
}

/// A Vantage console on a serial port. Blocking port I/O runs on tokio's blocking pool.
pub struct VantageDevice {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    settings: DecodeSettings,
}

#[async_trait]
impl Device for VantageDevice {
    async fn read_once(&mut self) -> Result<Reading, ReadError> {
        let port = Arc::clone(&self.port);
        let settings = self.settings;

        tokio::task::spawn_blocking(move || -> Result<Reading, ReadError> {
            let mut port = port
                .lock()
                .map_err(|_| ReadError::Unavailable("serial port lock poisoned".to_string()))?;
            let packet = read_loop_packet(&mut **port)?;
            let time = OffsetDateTime::now_utc();
            let conditions = decode_loop_packet(&packet, &settings)?;
            Ok(Reading::new(time, conditions))
        })
        .await
        .map_err(|e| ReadError::Unavailable(e.to_string()))?
    }
}

/// Opens Vantage consoles over `serialport`
#[derive(Debug, Clone, Copy, Default)]
pub struct VantageConnector;

#[async_trait]
impl DeviceConnector for VantageConnector {
    async fn connect(&self, config: &Configuration) -> Result<Box<dyn Device>, ConnectionError> {
        let path = config.path.clone();
        let baud_rate = config.baud_rate.as_u32();
        let settings = DecodeSettings::from(config);

        info!("Connecting to {} station on {} @ {} baud", config.model, path, baud_rate);

        let opened = tokio::task::spawn_blocking({
            let path = path.clone();
            move || -> Result<Box<dyn SerialPort>, String> {
                let mut port = serialport::new(path.as_str(), baud_rate)
                    .timeout(Duration::from_millis(PORT_TIMEOUT_MS))
                    .open()
                    .map_err(|e| e.to_string())?;
                wake_up(port.as_mut()).map_err(|e| e.to_string())?;
                Ok(port)
            }
        })
        .await
        .map_err(|e| ConnectionError::new(path.as_str(), e))?;

        let port = opened.map_err(|reason| ConnectionError::new(path.as_str(), reason))?;
        info!("Weather station on {} is awake", path);

        Ok(Box::new(VantageDevice {
            port: Arc::new(Mutex::new(port)),
            settings,
        }))
    }
}
