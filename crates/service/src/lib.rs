//! `service` crate — domain entities, validation, and the transactional
//! service layer for devices and their network configurations.

pub mod config;
pub mod device;
pub mod error;
pub mod models;
mod tx;
pub mod validate;

pub use config::ConfigService;
pub use device::DeviceService;
pub use error::ServiceError;
pub use models::{Device, NetworkConfig, DHCP_PLACEHOLDER};

#[cfg(test)]
mod service_tests;
