pub mod config;
pub mod delivery;
pub mod device;
pub mod error;
pub mod logging;
pub mod models;
pub mod recorder;
pub mod scheduler;
pub mod shutdown;
pub mod units;
pub mod utils;

pub use config::{ConfigOverrides, Configuration, TaskConfiguration, TaskOverrides};
pub use error::{ConfigurationError, ConnectionError, ReadError, RecorderError};
pub use models::{CurrentConditions, Reading};
pub use recorder::Recorder;
