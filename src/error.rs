/// Error taxonomy of the recorder
///
/// Configuration and connection errors are fatal and surface to whoever creates the
/// recorder. Read errors are retried inside the scheduling loop and only ever logged.
use thiserror::Error;

/// Raised while resolving the recorder or task configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("No serial path specified!")]
    MissingSerialPath,

    #[error("No rain collector size specified!")]
    MissingRainCollectorSize,

    #[error("No api url specified!")]
    MissingApi,

    #[error("No baud rate specified!")]
    MissingBaudRate,

    #[error("No weather station model specified!")]
    MissingModel,

    #[error("Invalid api url `{url}`: {reason}")]
    InvalidApi { url: String, reason: String },

    #[error("Invalid interval `{value}`: expected a whole number of seconds between 1 and one year")]
    InvalidInterval { value: String },
}

/// The weather station could not be reached while creating the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to connect to weather station on {path}: {reason}")]
pub struct ConnectionError {
    pub path: String,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(path: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A single reading could not be taken from the station.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("station did not wake up after {0} attempts")]
    WakeUp(u32),

    #[error("station did not acknowledge the LOOP command (got {0:#04x})")]
    NotAcknowledged(u8),

    #[error("LOOP packet failed CRC check")]
    Checksum,

    #[error("malformed LOOP packet: {0}")]
    MalformedPacket(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned when creating a [`crate::Recorder`].
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
