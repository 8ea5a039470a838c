/// Error types for decoding, scanning and configuration
use thiserror::Error;

/// Why an advertisement payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer is shorter than the structure it declares.
    #[error("malformed payload at offset {offset}: {reason}")]
    MalformedPayload { offset: usize, reason: &'static str },

    /// An event record whose type (or type/length pair) is not recognised.
    #[error("unknown event type {event_type:#06x} with length {length}")]
    UnknownEventType { event_type: u16, length: u8 },
}

/// A failure reported by, or while talking to, the radio adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("adapter error: {message}")]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything that can reach a listener's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("failed to decode advertisement from {address}: {source}")]
    Decode {
        address: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ScanError {
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    pub fn is_adapter_error(&self) -> bool {
        matches!(self, Self::Adapter(_))
    }
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be 'true' or 'false', got '{value}'")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} must be a whole number of milliseconds, got '{value}'")]
    InvalidDelay {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
