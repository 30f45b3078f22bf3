//! Infrastructure layer: in-memory host platform, configuration and the
//! service that wires the fulfillment stack together.

pub mod config;
pub mod host;
pub mod service;


pub use config::{ConfigError, FulfillmentConfig};
pub use host::InMemoryHost;
pub use service::{FulfillmentService, ValidationReport};
