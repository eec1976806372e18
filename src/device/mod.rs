pub mod vantage;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Configuration;
use crate::error::{ConnectionError, ReadError};
use crate::models::Reading;

pub use vantage::{VantageConnector, VantageDevice};

/// A connected weather station that can produce one reading at a time
#[async_trait]
pub trait Device: Send {
    async fn read_once(&mut self) -> Result<Reading, ReadError>;
}

/// Opens a [`Device`] using the serial path, baud rate and calibration of a
/// configuration.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(&self, config: &Configuration) -> Result<Box<dyn Device>, ConnectionError>;
}

/// Device handle shared between the recorder and its cycle task
pub type SharedDevice = Arc<Mutex<Box<dyn Device>>>;

pub fn shared(device: Box<dyn Device>) -> SharedDevice {
    Arc::new(Mutex::new(device))
}
