use std::fmt;

use time::OffsetDateTime;

/// One (service identifier, payload) pair from an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDataSegment {
    pub service: u16,
    pub data: Vec<u8>,
}

impl ServiceDataSegment {
    pub fn new(service: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            service,
            data: data.into(),
        }
    }
}

/// A device as reported by the radio adapter for a single discovery callback.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub id: String,
    pub address: String,
    pub rssi: i16,
    pub service_data: Vec<ServiceDataSegment>,
    pub seen_at: OffsetDateTime,
}

impl DiscoveredDevice {
    /// Find the payload advertised under the given 16-bit service identifier.
    pub fn service_data_for(&self, service: u16) -> Option<&[u8]> {
        self.service_data
            .iter()
            .find(|segment| segment.service == service)
            .map(|segment| segment.data.as_slice())
    }

    pub(crate) fn info(&self) -> DeviceInfo {
        DeviceInfo {
            address: self.address.clone(),
            rssi: self.rssi,
            seen_at: self.seen_at,
        }
    }
}

/// Originating device attached to every emitted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub address: String,
    pub rssi: i16,
    pub seen_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    Temperature,
    Humidity,
    Battery,
    Illuminance,
    Moisture,
    Fertility,
}

impl ReadingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingKind::Temperature => "temperature",
            ReadingKind::Humidity => "humidity",
            ReadingKind::Battery => "battery",
            ReadingKind::Illuminance => "illuminance",
            ReadingKind::Moisture => "moisture",
            ReadingKind::Fertility => "fertility",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ReadingKind::Temperature => "°C",
            ReadingKind::Humidity => "%RH",
            ReadingKind::Battery | ReadingKind::Moisture => "%",
            ReadingKind::Illuminance => "lx",
            ReadingKind::Fertility => "µS/cm",
        }
    }
}

/// A decoded physical value, already scaled to its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Degrees Celsius
    Temperature(f32),
    /// Relative humidity, percent
    Humidity(f32),
    /// Battery level, percent
    Battery(u8),
    /// Lux
    Illuminance(u32),
    /// Soil moisture, percent
    Moisture(u8),
    /// Soil conductivity, µS/cm
    Fertility(u16),
}

impl Measurement {
    pub fn kind(&self) -> ReadingKind {
        match self {
            Measurement::Temperature(_) => ReadingKind::Temperature,
            Measurement::Humidity(_) => ReadingKind::Humidity,
            Measurement::Battery(_) => ReadingKind::Battery,
            Measurement::Illuminance(_) => ReadingKind::Illuminance,
            Measurement::Moisture(_) => ReadingKind::Moisture,
            Measurement::Fertility(_) => ReadingKind::Fertility,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Temperature(v) | Measurement::Humidity(v) => write!(f, "{}", v),
            Measurement::Battery(v) | Measurement::Moisture(v) => write!(f, "{}", v),
            Measurement::Illuminance(v) => write!(f, "{}", v),
            Measurement::Fertility(v) => write!(f, "{}", v),
        }
    }
}

/// A measurement together with the device that advertised it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub measurement: Measurement,
    pub device: DeviceInfo,
}

impl Reading {
    pub fn kind(&self) -> ReadingKind {
        self.measurement.kind()
    }
}

/// Adapter power state. Only `PoweredOn` allows scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Unknown,
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unsupported,
    Resetting,
}

impl PowerState {
    pub fn is_powered_on(&self) -> bool {
        matches!(self, PowerState::PoweredOn)
    }
}

/// Notifications delivered by a radio adapter, in delivery order.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    PowerStateChange(PowerState),
    Discover(DiscoveredDevice),
    ScanStart,
    ScanStop,
    Warning(String),
    Error(String),
}
