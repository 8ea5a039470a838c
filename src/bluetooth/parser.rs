/// MiBeacon service-data decoding
///
/// Xiaomi sensors advertise their readings as service data under the 16-bit
/// service UUID 0xFE95. The payload has no published specification; the layout
/// below is what the hygrothermograph and flower-care families send:
///
/// - Bytes 0-1: Frame control
/// - Bytes 2-3: Product identifier (unsigned 16-bit, little-endian)
/// - Byte 4: Frame counter
/// - Bytes 5-10: Device MAC address, reversed
/// - Byte 11: Capability byte, only for products with a 7-byte header
/// - Remainder: event records, each `type (u16 LE) | length (u8) | value`
use log::debug;

use crate::error::DecodeError;
use crate::models::Measurement;

// MiBeacon protocol constants
pub const SERVICE_DATA_UUID: u16 = 0xfe95; // Xiaomi Inc. service data UUID
const PREAMBLE_LEN: usize = 5; // frame control + product id + frame counter
const RECORD_HEADER_LEN: usize = 3; // type + length
const DEFAULT_HEADER_LEN: usize = 6; // MAC address only

/// Header length after the frame counter, keyed by product identifier.
///
/// Unknown products fall back to [`DEFAULT_HEADER_LEN`]; new families belong
/// here rather than in the parser.
const PRODUCT_HEADERS: &[(u16, usize)] = &[
    (0x01aa, 6), // LYWSDCGQ hygrothermograph
    (0x0098, 7), // HHCCJCY01 flower care
];

/// Event record types
pub mod event_type {
    pub const TEMPERATURE: u16 = 0x1004;
    pub const HUMIDITY: u16 = 0x1006;
    pub const ILLUMINANCE: u16 = 0x1007;
    pub const MOISTURE: u16 = 0x1008;
    pub const FERTILITY: u16 = 0x1009;
    pub const BATTERY: u16 = 0x100a;
    pub const TEMPERATURE_AND_HUMIDITY: u16 = 0x100d;
}

/// Look up the post-counter header length for a product.
///
/// Returns `None` for products not in the table.
pub fn header_length(product_id: u16) -> Option<usize> {
    PRODUCT_HEADERS
        .iter()
        .find(|(id, _)| *id == product_id)
        .map(|(_, len)| *len)
}

/// A fully parsed advertisement payload
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementFrame {
    pub frame_control: u16,
    pub product_id: u16,
    pub frame_counter: u8,
    /// MAC address decoded from the payload, canonical order, lowercase
    pub address: String,
    pub measurements: Vec<Measurement>,
}

/// Decode a MiBeacon payload into its measurements.
///
/// Pure: the same buffer always yields the same result and is never modified.
/// A combined temperature+humidity record yields two measurements, temperature
/// first.
pub fn decode(data: &[u8]) -> Result<Vec<Measurement>, DecodeError> {
    parse_frame(data).map(|frame| frame.measurements)
}

/// Parse the full frame, header fields included.
pub fn parse_frame(data: &[u8]) -> Result<AdvertisementFrame, DecodeError> {
    if data.len() < PREAMBLE_LEN {
        return Err(DecodeError::MalformedPayload {
            offset: 0,
            reason: "shorter than frame preamble",
        });
    }

    let frame_control = u16::from_le_bytes([data[0], data[1]]);
    let product_id = u16::from_le_bytes([data[2], data[3]]);
    let frame_counter = data[4];

    let header_len = header_length(product_id).unwrap_or_else(|| {
        debug!(
            "Unknown product id {:#06x}, assuming {}-byte header",
            product_id, DEFAULT_HEADER_LEN
        );
        DEFAULT_HEADER_LEN
    });

    let records_start = PREAMBLE_LEN + header_len;
    if data.len() < records_start {
        return Err(DecodeError::MalformedPayload {
            offset: PREAMBLE_LEN,
            reason: "shorter than product header",
        });
    }

    // Any bytes past the address are reserved capability data and skipped
    let address = format_reversed_mac(&data[PREAMBLE_LEN..PREAMBLE_LEN + 6]);

    let mut measurements = Vec::new();
    let mut offset = records_start;
    while offset < data.len() {
        let remaining = &data[offset..];
        if remaining.len() < RECORD_HEADER_LEN {
            return Err(DecodeError::MalformedPayload {
                offset,
                reason: "truncated event record header",
            });
        }

        let record_type = u16::from_le_bytes([remaining[0], remaining[1]]);
        let length = remaining[2];
        let value_end = RECORD_HEADER_LEN + length as usize;
        if remaining.len() < value_end {
            return Err(DecodeError::MalformedPayload {
                offset,
                reason: "event record value exceeds payload",
            });
        }

        decode_record(
            record_type,
            &remaining[RECORD_HEADER_LEN..value_end],
            &mut measurements,
        )?;
        offset += value_end;
    }

    Ok(AdvertisementFrame {
        frame_control,
        product_id,
        frame_counter,
        address,
        measurements,
    })
}

/// Decode one event record value, appending its measurements.
fn decode_record(
    record_type: u16,
    value: &[u8],
    out: &mut Vec<Measurement>,
) -> Result<(), DecodeError> {
    match (record_type, value) {
        // Signed 16-bit, 0.1°C resolution
        (event_type::TEMPERATURE, &[lo, hi]) => out.push(temperature(lo, hi)),
        // Unsigned 16-bit, 0.1% resolution
        (event_type::HUMIDITY, &[lo, hi]) => out.push(humidity(lo, hi)),
        (event_type::BATTERY, &[level]) => out.push(Measurement::Battery(level)),
        // Unsigned 24-bit lux
        (event_type::ILLUMINANCE, &[b0, b1, b2]) => {
            out.push(Measurement::Illuminance(u32::from_le_bytes([b0, b1, b2, 0])))
        }
        (event_type::MOISTURE, &[percent]) => out.push(Measurement::Moisture(percent)),
        (event_type::FERTILITY, &[lo, hi]) => {
            out.push(Measurement::Fertility(u16::from_le_bytes([lo, hi])))
        }
        (event_type::TEMPERATURE_AND_HUMIDITY, &[t_lo, t_hi, h_lo, h_hi]) => {
            out.push(temperature(t_lo, t_hi));
            out.push(humidity(h_lo, h_hi));
        }
        _ => {
            return Err(DecodeError::UnknownEventType {
                event_type: record_type,
                length: value.len() as u8,
            })
        }
    }
    Ok(())
}

fn temperature(lo: u8, hi: u8) -> Measurement {
    Measurement::Temperature(f32::from(i16::from_le_bytes([lo, hi])) / 10.0)
}

fn humidity(lo: u8, hi: u8) -> Measurement {
    Measurement::Humidity(f32::from(u16::from_le_bytes([lo, hi])) / 10.0)
}

/// Format a little-endian MAC as `aa:bb:cc:dd:ee:ff`.
fn format_reversed_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .rev()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}
