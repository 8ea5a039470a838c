//! Passive discovery and decoding of Xiaomi MiBeacon environmental sensors.
//!
//! [`ScanController`] mirrors the radio's power state onto scanning, filters
//! discovered devices by address, and decodes the 0xFE95 service data of each
//! advertisement into typed readings delivered to a [`SensorListener`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

#[cfg(feature = "bluetooth")]
pub use bluetooth::BluezCentral;
pub use bluetooth::{
    decode, parse_frame, AdvertisementFrame, Central, DeviceFilter, Notification, ScanController,
    ScanOptions, ScanState, SensorListener, SERVICE_DATA_UUID,
};
pub use config::ScannerConfig;
pub use error::{AdapterError, ConfigError, DecodeError, ScanError};
pub use models::{
    AdapterEvent, DeviceInfo, DiscoveredDevice, Measurement, PowerState, Reading, ReadingKind,
    ServiceDataSegment,
};
