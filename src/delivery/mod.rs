pub mod gateway;
pub mod transport;

pub use gateway::{DeliveryGateway, DeliveryOutcome};
pub use transport::{HttpTransport, Transport, TransportResponse};
