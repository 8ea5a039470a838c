#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod filter;
pub mod parser;
pub mod scanner;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezCentral;
pub use filter::DeviceFilter;
pub use parser::{decode, parse_frame, AdvertisementFrame, SERVICE_DATA_UUID};
pub use scanner::{Central, Notification, ScanController, ScanOptions, ScanState, SensorListener};
